//! Exercises the `trace`-feature tracing output, so the `tracing-subscriber`
//! dev-dependency has a real consumer rather than sitting unused.

#![cfg(feature = "trace")]

use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn user_error_warning_is_emitted_as_a_tracing_event() {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let shared = SharedBuf(buf.clone());
    let make_writer = move || shared.clone();
    let subscriber = tracing_subscriber::fmt().with_writer(make_writer).finish();

    let captured = {
        let _guard = tracing::subscriber::set_default(subscriber);
        reactive_core::mark_raw(&reactive_core::Value::Int(1));
        String::from_utf8(buf.lock().unwrap().clone()).unwrap()
    };

    assert!(
        captured.contains("markRaw called on a value that is not an aggregate"),
        "expected the onTrack/onTrigger-style warn_debug event in captured output, got: {captured}"
    );
}
