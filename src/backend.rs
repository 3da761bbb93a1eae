use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{Fragment, Message, OpenTurn, TurnEvent};

const DEFAULT_BACKEND: &str = "cinematch-backend";

fn backend_command() -> String {
    std::env::var("CINEMATCH_BACKEND")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string())
}

#[derive(Serialize)]
struct TurnRequest<'a> {
    messages: &'a [Message],
}

/// Events the backend writes to stdout, one JSON object per line. `done` and
/// `error` are terminal.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireEvent {
    Text {
        text: String,
    },
    ToolCall {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default)]
        payload: Value,
    },
    Reasoning {
        text: String,
    },
    Done,
    Error {
        reason: String,
    },
}

fn parse_wire_event(line: &str) -> Option<WireEvent> {
    serde_json::from_str(line).ok()
}

/// Run one completion turn on a worker thread. Events land on `tx`; the
/// child pid is recorded so `cancel` can reach it.
pub(crate) fn open_turn(turn: OpenTurn, tx: Sender<TurnEvent>, child_pids: Arc<Mutex<Vec<u32>>>) {
    std::thread::spawn(move || {
        let started = Instant::now();
        if let Err(reason) = run_turn(&turn, &tx, &child_pids, started) {
            let _ = tx.send(TurnEvent::Failed { reason });
        }
        if let Ok(mut pids) = child_pids.lock() {
            pids.clear();
        }
    });
}

/// Best-effort abandonment of the in-flight turn. Local status never waits
/// for this to land.
pub(crate) fn cancel(child_pids: &Arc<Mutex<Vec<u32>>>) {
    let pids: Vec<u32> = child_pids
        .lock()
        .map(|mut pids| pids.drain(..).collect())
        .unwrap_or_default();
    for pid in pids {
        kill_pid(pid);
    }
}

fn kill_pid(pid: u32) {
    let _ = Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

fn run_turn(
    turn: &OpenTurn,
    tx: &Sender<TurnEvent>,
    child_pids: &Arc<Mutex<Vec<u32>>>,
    started: Instant,
) -> Result<(), String> {
    let mut cmd = Command::new(backend_command());
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("backend spawn failed: {e}"))?;
    if let Ok(mut pids) = child_pids.lock() {
        pids.push(child.id());
    }

    let request = serde_json::to_string(&TurnRequest {
        messages: &turn.request,
    })
    .map_err(|e| format!("request encode failed: {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(request.as_bytes())
            .map_err(|e| format!("backend stdin write failed: {e}"))?;
        // Dropping stdin closes it; the backend reads to EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "backend stdout missing".to_string())?;
    let reader = BufReader::new(stdout);
    let mut finished = false;

    for line in reader.lines() {
        let line = line.map_err(|e| format!("backend stream read failed: {e}"))?;
        if line.trim().is_empty() {
            continue;
        }
        // Unknown event types are skipped so new tool kinds don't break us.
        let Some(event) = parse_wire_event(&line) else {
            continue;
        };
        match event {
            WireEvent::Text { text } => send_fragment(tx, turn, Fragment::Text { text }),
            WireEvent::ToolCall { tool_name, args } => {
                send_fragment(tx, turn, Fragment::ToolCall { tool_name, args })
            }
            WireEvent::ToolResult { tool_name, payload } => {
                send_fragment(tx, turn, Fragment::ToolResult { tool_name, payload })
            }
            WireEvent::Reasoning { text } => {
                send_fragment(tx, turn, Fragment::Reasoning { text })
            }
            WireEvent::Done => {
                let _ = tx.send(TurnEvent::Completed {
                    message_id: turn.reply_id.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
                finished = true;
            }
            WireEvent::Error { reason } => {
                let _ = tx.send(TurnEvent::Failed { reason });
                finished = true;
            }
        }
        if finished {
            break;
        }
    }

    let mut detail = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut detail);
    }
    let status = child
        .wait()
        .map_err(|e| format!("backend wait failed: {e}"))?;

    if finished {
        return Ok(());
    }
    if status.success() {
        Err("backend stream ended without a result".to_string())
    } else {
        let detail = detail.trim();
        if detail.is_empty() {
            Err(format!("backend failed: {status}"))
        } else {
            Err(format!("backend failed: {detail}"))
        }
    }
}

fn send_fragment(tx: &Sender<TurnEvent>, turn: &OpenTurn, fragment: Fragment) {
    let _ = tx.send(TurnEvent::Fragment {
        message_id: turn.reply_id.clone(),
        fragment,
    });
}
