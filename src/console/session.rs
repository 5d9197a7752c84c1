// Stdin command loop.

use super::commands::{self, Command};
use super::host::ConsoleHost;
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Feed lines from `input` to the host until `exit`, end of input, or Ctrl-C.
///
/// On every way out, online senders are disconnected so their mutes pause.
pub async fn run_session<R, W>(host: &ConsoleHost, input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };

        let Some(line) = line else {
            host.handle(Command::Exit, Utc::now()).await?;
            return Ok(());
        };

        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                output.write_all(format!("{}\n", e).as_bytes()).await?;
                continue;
            }
        };
        let exiting = command == Command::Exit;

        match host.handle(command, Utc::now()).await {
            Ok(reply) => {
                for line in reply {
                    output.write_all(format!("{}\n", line).as_bytes()).await?;
                }
            }
            Err(e) => {
                tracing::error!("{:#}", e);
                output.write_all(format!("error: {:#}\n", e).as_bytes()).await?;
            }
        }
        output.flush().await?;

        if exiting {
            return Ok(());
        }
    }
}
