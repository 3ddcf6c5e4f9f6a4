use anyhow::{Result, anyhow, bail};
use dialoguer::{Select, theme::ColorfulTheme};
use tokio::process::Command;

use crate::api::ranked_servers;
use crate::types::{StreamingServer, StreamingServerItem};

/// Pick a streaming server, best quality preselected. A single candidate
/// is taken without prompting.
pub fn choose_server(servers: &[StreamingServer]) -> Result<Option<(String, StreamingServerItem)>> {
    let mut ranked = ranked_servers(servers);
    if ranked.is_empty() {
        return Ok(None);
    }
    if ranked.len() == 1 {
        return Ok(Some(ranked.remove(0)));
    }

    let labels: Vec<String> = ranked
        .iter()
        .map(|(quality, item)| {
            if item.is_default.unwrap_or(false) {
                format!("{quality} · {} (default)", item.provider)
            } else {
                format!("{quality} · {}", item.provider)
            }
        })
        .collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a server")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection.map(|idx| ranked.remove(idx)))
}

/// Hand a resolved stream URL to the configured player (mpv by default;
/// override via the `player` setting or `SUKANIME_PLAYER`).
pub async fn launch_player(player: &str, url: &str, media_title: &str) -> Result<()> {
    let parts =
        shlex::split(player).ok_or_else(|| anyhow!("player command '{player}' is not parseable"))?;
    let Some((program, extra_args)) = parts.split_first() else {
        bail!("player command is empty");
    };

    let mut cmd = Command::new(program);
    cmd.args(extra_args);
    cmd.arg("--quiet");
    cmd.arg("--terminal=no");
    cmd.arg(format!("--force-media-title={media_title}"));
    cmd.arg(url);

    let status = match cmd.status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or point the player setting (or SUKANIME_PLAYER) at a valid command.",
                    program
                ));
            }
            return Err(anyhow!(err).context(format!("failed to launch player '{program}'")));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}
