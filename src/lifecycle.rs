//! Navigation, error, rejection and page-hide observation.
//!
//! [`RecordingHistory`] decorates the page's history mutators so every
//! programmatic navigation yields exactly one `nav` event, and the
//! [`LifecycleObserver`] converts passive page signals (uncaught errors,
//! unhandled rejections, popstate/hashchange, pagehide) into session events
//! without ever interfering with the browser's own handling.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{ConsoleLevel, ConsolePayload, CustomData, NavPayload, OpenerMessage};
use crate::page::{HistoryApi, OpenerWindow, PageSignal};
use crate::session::SessionBuffer;
use crate::util::now_ms;

/// Decorator over the captured history mutators: invoke the original, then
/// record the post-mutation location.
pub struct RecordingHistory {
    inner: Arc<dyn HistoryApi>,
    buffer: SessionBuffer,
}

impl RecordingHistory {
    pub fn new(inner: Arc<dyn HistoryApi>, buffer: SessionBuffer) -> Self {
        Self { inner, buffer }
    }

    /// Records one `nav` event for the current location. Also the entry
    /// point for browser-driven transitions (popstate/hashchange).
    pub fn record_nav(&self) {
        self.buffer.record_custom(CustomData::Nav(NavPayload {
            href: self.inner.href(),
            t: now_ms(),
        }));
    }
}

impl HistoryApi for RecordingHistory {
    fn push_state(&self, url: &str) {
        self.inner.push_state(url);
        self.record_nav();
    }

    fn replace_state(&self, url: &str) {
        self.inner.replace_state(url);
        self.record_nav();
    }

    fn href(&self) -> String {
        self.inner.href()
    }
}

/// Converts passive page signals into session events and the one-shot
/// window-closing notice.
pub struct LifecycleObserver {
    buffer: SessionBuffer,
    history: Arc<RecordingHistory>,
    opener: Option<Arc<dyn OpenerWindow>>,
}

impl LifecycleObserver {
    pub fn new(
        buffer: SessionBuffer,
        history: Arc<RecordingHistory>,
        opener: Option<Arc<dyn OpenerWindow>>,
    ) -> Self {
        Self {
            buffer,
            history,
            opener,
        }
    }

    /// Drives the observer from the page's signal stream until the page
    /// stops producing signals.
    pub fn spawn(self, mut signals: mpsc::UnboundedReceiver<PageSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                self.handle(signal);
            }
        })
    }

    /// Processes one signal. Runs to completion; any failure here is an
    /// instrumentation failure and stays inside this boundary.
    pub fn handle(&self, signal: PageSignal) {
        match signal {
            PageSignal::Error {
                message,
                stack,
                source,
                line,
                column,
            } => {
                let args = vec![stack.unwrap_or_else(|| message.clone())];
                self.buffer
                    .record_custom(CustomData::Console(ConsolePayload {
                        level: ConsoleLevel::Error,
                        message: format!("Uncaught Error: {message}"),
                        args,
                        timestamp: now_ms(),
                        url: self.history.href(),
                        source,
                        line,
                        column,
                    }));
            }
            PageSignal::UnhandledRejection { reason } => {
                self.buffer
                    .record_custom(CustomData::Console(ConsolePayload {
                        level: ConsoleLevel::Error,
                        message: format!("Unhandled Promise Rejection: {reason}"),
                        args: vec![reason],
                        timestamp: now_ms(),
                        url: self.history.href(),
                        source: None,
                        line: None,
                        column: None,
                    }));
            }
            PageSignal::PopState | PageSignal::HashChange => {
                self.history.record_nav();
            }
            PageSignal::PageHide { persisted } => {
                // persisted = true is a back/forward-cache park, not a close.
                if !persisted {
                    self.notify_opener_closing();
                }
            }
        }
    }

    fn notify_opener_closing(&self) {
        let Some(opener) = &self.opener else {
            return;
        };
        if opener.is_closed() {
            return;
        }
        let message = OpenerMessage::WindowClosing {
            url: self.history.href(),
            timestamp: now_ms(),
        };
        if let Err(err) = opener.post_message(&message) {
            tracing::debug!(error = %err, "failed to send window_closing message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvent;
    use crate::page::mock::{MockHistory, MockOpener};

    fn custom_data(event: &SessionEvent) -> &CustomData {
        &event.as_custom().expect("custom event").data
    }

    fn make_observer(
        buffer: &SessionBuffer,
        opener: Option<Arc<MockOpener>>,
    ) -> (LifecycleObserver, Arc<RecordingHistory>) {
        let history = Arc::new(RecordingHistory::new(
            Arc::new(MockHistory::new("https://example.com/")),
            buffer.clone(),
        ));
        let observer = LifecycleObserver::new(
            buffer.clone(),
            history.clone(),
            opener.map(|o| o as Arc<dyn OpenerWindow>),
        );
        (observer, history)
    }

    #[test]
    fn push_state_emits_exactly_one_nav() {
        let buffer = SessionBuffer::new();
        let (_, history) = make_observer(&buffer, None);

        history.push_state("/page2");

        let dump = buffer.dump();
        assert_eq!(dump.len(), 1);
        match custom_data(&dump[0]) {
            CustomData::Nav(nav) => assert!(nav.href.ends_with("/page2")),
            other => panic!("expected nav, got {other:?}"),
        }
    }

    #[test]
    fn replace_state_also_emits_nav() {
        let buffer = SessionBuffer::new();
        let (_, history) = make_observer(&buffer, None);
        history.replace_state("/swapped");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn popstate_and_hashchange_emit_navs() {
        let buffer = SessionBuffer::new();
        let (observer, _) = make_observer(&buffer, None);
        observer.handle(PageSignal::PopState);
        observer.handle(PageSignal::HashChange);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn uncaught_error_becomes_console_event() {
        let buffer = SessionBuffer::new();
        let (observer, _) = make_observer(&buffer, None);

        observer.handle(PageSignal::Error {
            message: "boom".into(),
            stack: Some("Error: boom\n  at main.js:3:7".into()),
            source: Some("main.js".into()),
            line: Some(3),
            column: Some(7),
        });

        let dump = buffer.dump();
        match custom_data(&dump[0]) {
            CustomData::Console(console) => {
                assert_eq!(console.level, ConsoleLevel::Error);
                assert!(console.message.starts_with("Uncaught Error:"));
                assert_eq!(console.args[0], "Error: boom\n  at main.js:3:7");
                assert_eq!(console.line, Some(3));
            }
            other => panic!("expected console, got {other:?}"),
        }
    }

    #[test]
    fn rejection_without_stack_falls_back_to_reason() {
        let buffer = SessionBuffer::new();
        let (observer, _) = make_observer(&buffer, None);

        observer.handle(PageSignal::UnhandledRejection {
            reason: "denied".into(),
        });

        match custom_data(&buffer.dump()[0]) {
            CustomData::Console(console) => {
                assert!(console
                    .message
                    .starts_with("Unhandled Promise Rejection:"));
                assert_eq!(console.args, vec!["denied".to_string()]);
                assert!(console.source.is_none());
            }
            other => panic!("expected console, got {other:?}"),
        }
    }

    #[test]
    fn pagehide_persisted_is_ignored() {
        let buffer = SessionBuffer::new();
        let opener = Arc::new(MockOpener::new());
        let (observer, _) = make_observer(&buffer, Some(opener.clone()));

        observer.handle(PageSignal::PageHide { persisted: true });
        assert!(opener.messages().is_empty());
    }

    #[test]
    fn pagehide_closure_notifies_open_opener() {
        let buffer = SessionBuffer::new();
        let opener = Arc::new(MockOpener::new());
        let (observer, _) = make_observer(&buffer, Some(opener.clone()));

        observer.handle(PageSignal::PageHide { persisted: false });

        let messages = opener.messages();
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], OpenerMessage::WindowClosing { .. }));
    }

    #[test]
    fn closed_opener_is_skipped_and_failures_are_swallowed() {
        let buffer = SessionBuffer::new();
        let opener = Arc::new(MockOpener::new());
        opener.close();
        let (observer, _) = make_observer(&buffer, Some(opener.clone()));

        observer.handle(PageSignal::PageHide { persisted: false });
        assert!(opener.messages().is_empty());

        let failing = Arc::new(MockOpener::new());
        failing.fail_next_post();
        let (observer, _) = make_observer(&buffer, Some(failing));
        // Must not panic or surface the failure.
        observer.handle(PageSignal::PageHide { persisted: false });
    }

    #[tokio::test]
    async fn spawned_observer_drains_the_signal_stream() {
        let buffer = SessionBuffer::new();
        let (observer, _) = make_observer(&buffer, None);

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = observer.spawn(rx);
        tx.send(PageSignal::PopState).unwrap();
        tx.send(PageSignal::UnhandledRejection {
            reason: "late".into(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(buffer.len(), 2);
    }
}
