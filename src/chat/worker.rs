use super::*;

impl ChatApp {
    /// Drain pending boundary events into the conversation. Saves are
    /// coalesced to one per drained batch; they run on this thread, so a
    /// later save can never be overtaken by an earlier one.
    pub(super) fn poll_backend(&mut self) -> bool {
        let Some(rx) = self.rx.clone() else {
            return false;
        };
        let mut processed_any = false;
        let mut changed = false;

        loop {
            match rx.try_recv() {
                Ok(event) => {
                    processed_any = true;
                    let terminal = matches!(
                        event,
                        TurnEvent::Completed { .. } | TurnEvent::Failed { .. }
                    );
                    if self.conversation.apply_event(event) {
                        changed = true;
                    }
                    if terminal {
                        self.rx = None;
                        if let Ok(mut pids) = self.child_pids.lock() {
                            pids.clear();
                        }
                        break;
                    }
                }
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    // The worker died without a terminal event; treat it as a
                    // boundary failure.
                    processed_any = true;
                    changed = true;
                    self.conversation.apply_event(TurnEvent::Failed {
                        reason: "backend disconnected".to_string(),
                    });
                    self.rx = None;
                    break;
                }
            }
        }

        if changed {
            self.conversation.persist();
            self.follow_scroll();
        }
        processed_any
    }
}
