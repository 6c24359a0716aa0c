use crate::muter::Muter;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteCommand {
    Mute,
    Unmute,
    Toggle,
}

pub fn parse_command(line: &str) -> Option<MuteCommand> {
    match line.trim().to_lowercase().as_str() {
        "m" | "mute" => Some(MuteCommand::Mute),
        "u" | "unmute" => Some(MuteCommand::Unmute),
        "t" | "toggle" => Some(MuteCommand::Toggle),
        _ => None,
    }
}

/// Applies one command per input line to `muter` until the input ends or
/// `cancel` fires.
pub async fn control_loop<R>(input: R, muter: Muter, cancel: CancellationToken)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped reading mute commands: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(MuteCommand::Mute) => muter.mute(),
            Some(MuteCommand::Unmute) => muter.unmute(),
            Some(MuteCommand::Toggle) => {
                muter.toggle();
            }
            None => {
                warn!("Unknown command '{}', expected mute, unmute or toggle", line.trim());
                continue;
            }
        }
        info!(
            "Logs {}",
            if muter.is_muted() { "muted" } else { "unmuted" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("m"), Some(MuteCommand::Mute));
        assert_eq!(parse_command(" MUTE \n"), Some(MuteCommand::Mute));
        assert_eq!(parse_command("unmute"), Some(MuteCommand::Unmute));
        assert_eq!(parse_command("t"), Some(MuteCommand::Toggle));
        assert_eq!(parse_command("quit"), None);
    }

    #[tokio::test]
    async fn test_control_loop_applies_commands_in_order() {
        let muter = Muter::new();
        let cancel = CancellationToken::new();
        control_loop(
            &b"mute\nbogus\n\nunmute\ntoggle\n"[..],
            muter.clone(),
            cancel.clone(),
        )
        .await;
        assert!(muter.is_muted());

        control_loop(&b"t"[..], muter.clone(), cancel).await;
        assert!(!muter.is_muted());
    }

    #[tokio::test]
    async fn test_control_loop_stops_on_cancel_while_waiting_for_input() {
        let muter = Muter::new();
        let cancel = CancellationToken::new();
        // Writer half kept alive so the reader never sees end of input
        let (_writer, reader) = tokio::io::duplex(64);
        let task = tokio::spawn(control_loop(
            tokio::io::BufReader::new(reader),
            muter.clone(),
            cancel.clone(),
        ));

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("control loop kept running after cancel")
            .unwrap();
        assert!(!muter.is_muted());
    }
}
