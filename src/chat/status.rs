/// Conversation-wide status. One value per process, cycling once per turn;
/// neither `Idle` nor `Error` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChatStatus {
    Idle,
    Submitted,
    Streaming,
    Error,
}

impl ChatStatus {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ChatStatus::Idle => "ready",
            ChatStatus::Submitted => "thinking",
            ChatStatus::Streaming => "streaming",
            ChatStatus::Error => "error",
        }
    }

    /// The send affordance is live only here; everywhere else a turn is in
    /// flight and submission must wait.
    pub(crate) fn can_send(self) -> bool {
        matches!(self, ChatStatus::Idle | ChatStatus::Error)
    }

    pub(crate) fn can_stop(self) -> bool {
        matches!(self, ChatStatus::Submitted | ChatStatus::Streaming)
    }

    pub(crate) fn is_running(self) -> bool {
        self.can_stop()
    }

    // Transitions are total: inputs that the table does not allow leave the
    // status unchanged.

    pub(crate) fn on_send(self) -> Self {
        if self.can_send() {
            ChatStatus::Submitted
        } else {
            self
        }
    }

    pub(crate) fn on_first_fragment(self) -> Self {
        if self == ChatStatus::Submitted {
            ChatStatus::Streaming
        } else {
            self
        }
    }

    pub(crate) fn on_complete(self) -> Self {
        if self.is_running() {
            ChatStatus::Idle
        } else {
            self
        }
    }

    pub(crate) fn on_failure(self) -> Self {
        if self.is_running() {
            ChatStatus::Error
        } else {
            self
        }
    }

    /// User cancellation is unconditional locally: the boundary is only
    /// asked to stop, but status drops to idle right away.
    pub(crate) fn on_stop(self) -> Self {
        if self.is_running() {
            ChatStatus::Idle
        } else {
            self
        }
    }
}
