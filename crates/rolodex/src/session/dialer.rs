//! The dial-pad screen session: digit entry and call dispatch.

use std::sync::Arc;

use crate::error::Result;
use crate::platform::{Dialer, Permission, PermissionPrompt};

use super::{CallOutcome, PermissionGate, PermissionState};

/// State holder for the numeric dial pad.
///
/// Plain synchronous state: digits are appended up to a cap and removed from
/// the end, like the pad the screen renders. Only `call` is async, because
/// it may have to prompt for the call permission (at most once; a denial is
/// durable for this session).
pub struct DialerSession {
    number: String,
    max_digits: usize,
    gate: PermissionGate,
    dialer: Arc<dyn Dialer>,
}

impl DialerSession {
    /// Create a dial-pad session. `max_digits` caps the entered number
    /// length.
    #[must_use]
    pub fn new(dialer: Arc<dyn Dialer>, prompt: Arc<dyn PermissionPrompt>, max_digits: usize) -> Self {
        Self {
            number: String::new(),
            max_digits,
            gate: PermissionGate::new(Permission::PlaceCalls, prompt),
            dialer,
        }
    }

    /// The number entered so far.
    #[must_use]
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Where the call permission stands, without prompting.
    #[must_use]
    pub fn permission(&self) -> PermissionState {
        self.gate.state()
    }

    /// Append a pad key (`0`-`9`, `*`, `#`). Returns whether the key was
    /// accepted; anything else, or input past the cap, is ignored.
    pub fn press(&mut self, key: char) -> bool {
        let valid = key.is_ascii_digit() || key == '*' || key == '#';
        if !valid || self.number.len() >= self.max_digits {
            return false;
        }
        self.number.push(key);
        true
    }

    /// Remove the last entered key, if any.
    pub fn delete_last(&mut self) {
        self.number.pop();
    }

    /// Clear the entered number.
    pub fn clear(&mut self) {
        self.number.clear();
    }

    /// Place a call to the entered number.
    ///
    /// An empty pad is a [`CallOutcome::NothingToDial`] no-op. Otherwise the
    /// call permission is resolved (prompting at most once) and the number
    /// dispatched verbatim when granted.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform dialer fails to dispatch.
    pub async fn call(&self) -> Result<CallOutcome> {
        if self.number.is_empty() {
            return Ok(CallOutcome::NothingToDial);
        }

        match self.gate.ensure().await {
            PermissionState::Granted => {
                self.dialer.place_call(&self.number)?;
                Ok(CallOutcome::CallPlaced)
            }
            _ => Ok(CallOutcome::PermissionDenied),
        }
    }

    /// Open the system dial screen pre-filled with the entered number. No
    /// permission involved.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to open the dial screen.
    pub fn open_dial_screen(&self) -> Result<CallOutcome> {
        if self.number.is_empty() {
            return Ok(CallOutcome::NothingToDial);
        }

        self.dialer.open_dial_screen(&self.number)?;
        Ok(CallOutcome::DialScreenOpened)
    }
}

impl std::fmt::Debug for DialerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialerSession")
            .field("number", &self.number)
            .field("max_digits", &self.max_digits)
            .field("permission", &self.gate.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fakes::{RecordingDialer, ScriptedPrompt};

    fn session_with(
        dialer: Arc<RecordingDialer>,
        prompt: Arc<ScriptedPrompt>,
    ) -> DialerSession {
        DialerSession::new(dialer, prompt, 15)
    }

    #[test]
    fn test_press_accepts_pad_keys() {
        let mut session = session_with(
            Arc::new(RecordingDialer::new()),
            Arc::new(ScriptedPrompt::granting()),
        );

        assert!(session.press('5'));
        assert!(session.press('*'));
        assert!(session.press('#'));
        assert_eq!(session.number(), "5*#");
    }

    #[test]
    fn test_press_rejects_other_keys() {
        let mut session = session_with(
            Arc::new(RecordingDialer::new()),
            Arc::new(ScriptedPrompt::granting()),
        );

        assert!(!session.press('a'));
        assert!(!session.press(' '));
        assert!(session.number().is_empty());
    }

    #[test]
    fn test_press_stops_at_the_cap() {
        let mut session = DialerSession::new(
            Arc::new(RecordingDialer::new()),
            Arc::new(ScriptedPrompt::granting()),
            3,
        );

        assert!(session.press('1'));
        assert!(session.press('2'));
        assert!(session.press('3'));
        assert!(!session.press('4'));
        assert_eq!(session.number(), "123");
    }

    #[test]
    fn test_delete_last_and_clear() {
        let mut session = session_with(
            Arc::new(RecordingDialer::new()),
            Arc::new(ScriptedPrompt::granting()),
        );

        session.press('1');
        session.press('2');
        session.delete_last();
        assert_eq!(session.number(), "1");

        // deleting on an empty pad is harmless
        session.delete_last();
        session.delete_last();
        assert!(session.number().is_empty());

        session.press('9');
        session.clear();
        assert!(session.number().is_empty());
    }

    #[tokio::test]
    async fn test_call_with_empty_pad_is_noop() {
        let dialer = Arc::new(RecordingDialer::new());
        let prompt = Arc::new(ScriptedPrompt::granting());
        let session = session_with(dialer.clone(), prompt.clone());

        assert_eq!(session.call().await.unwrap(), CallOutcome::NothingToDial);
        assert!(dialer.calls.lock().unwrap().is_empty());
        // an empty pad never even prompts
        assert_eq!(prompt.request_count(), 0);
    }

    #[tokio::test]
    async fn test_call_dispatches_entered_number() {
        let dialer = Arc::new(RecordingDialer::new());
        let mut session = session_with(dialer.clone(), Arc::new(ScriptedPrompt::granting()));

        for key in "5551111".chars() {
            session.press(key);
        }

        assert_eq!(session.call().await.unwrap(), CallOutcome::CallPlaced);
        assert_eq!(dialer.calls.lock().unwrap().as_slice(), ["5551111"]);
    }

    #[tokio::test]
    async fn test_denied_call_is_durable() {
        let dialer = Arc::new(RecordingDialer::new());
        let prompt = Arc::new(ScriptedPrompt::denying());
        let mut session = session_with(dialer.clone(), prompt.clone());
        session.press('1');

        assert_eq!(session.call().await.unwrap(), CallOutcome::PermissionDenied);
        assert_eq!(session.call().await.unwrap(), CallOutcome::PermissionDenied);
        assert_eq!(prompt.request_count(), 1);
        assert_eq!(session.permission(), PermissionState::Denied);
        assert!(dialer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_dial_screen_skips_the_prompt() {
        let dialer = Arc::new(RecordingDialer::new());
        let prompt = Arc::new(ScriptedPrompt::denying());
        let mut session = session_with(dialer.clone(), prompt.clone());
        session.press('7');

        assert_eq!(
            session.open_dial_screen().unwrap(),
            CallOutcome::DialScreenOpened
        );
        assert_eq!(dialer.dial_screens.lock().unwrap().as_slice(), ["7"]);
        assert_eq!(prompt.request_count(), 0);
    }
}
