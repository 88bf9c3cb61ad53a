//! Boot-time user data for provisioned viewer instances.

/// Public page of a channel.
pub fn channel_url(channel: &str) -> String {
    format!("http://twitch.tv/{channel}")
}

/// PowerShell user data that opens the channel in Edge once the instance boots.
pub fn edge_launch_script(channel: &str) -> String {
    format!(
        "\n<powershell>\nStart-Process \"microsoft-edge:{}\" -ArgumentList \"--no-first-run --profile-directory=Default\"\n</powershell>\n",
        channel_url(channel)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url() {
        assert_eq!(channel_url("KaiCenat"), "http://twitch.tv/KaiCenat");
    }

    #[test]
    fn test_edge_launch_script_wraps_powershell_block() {
        let script = edge_launch_script("KaiCenat");
        let lines: Vec<&str> = script.trim().lines().collect();

        assert_eq!(lines.first(), Some(&"<powershell>"));
        assert_eq!(lines.last(), Some(&"</powershell>"));
        assert!(lines[1].contains("microsoft-edge:http://twitch.tv/KaiCenat"));
        assert!(lines[1].contains("--no-first-run --profile-directory=Default"));
    }
}
