use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub status: String,
}

type Sink = Box<dyn FnMut(ProgressUpdate) + Send>;

/// Forwards progress to an optional callback. Percent never decreases and never
/// exceeds 100; a lower value repeats the last percent with the new status.
pub struct ProgressReporter {
    last: u8,
    sink: Option<Sink>,
}

impl ProgressReporter {
    pub fn new(sink: impl FnMut(ProgressUpdate) + Send + 'static) -> Self {
        Self {
            last: 0,
            sink: Some(Box::new(sink)),
        }
    }

    #[cfg(test)]
    pub fn silent() -> Self {
        Self { last: 0, sink: None }
    }

    #[cfg(test)]
    pub fn percent(&self) -> u8 {
        self.last
    }

    pub fn report(&mut self, percent: u8, status: &str) {
        self.last = self.last.max(percent.min(100));
        if let Some(sink) = self.sink.as_mut() {
            sink(ProgressUpdate {
                percent: self.last,
                status: status.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_percent_is_monotonic_and_capped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut progress = ProgressReporter::new(move |u| sink.lock().unwrap().push(u.percent));

        progress.report(10, "Reading file");
        progress.report(40, "Text recovered");
        progress.report(20, "Retrying");
        progress.report(250, "Done");

        assert_eq!(*seen.lock().unwrap(), vec![10, 40, 40, 100]);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_silent_reporter_tracks_percent() {
        let mut progress = ProgressReporter::silent();
        progress.report(55, "Classifying sections");
        assert_eq!(progress.percent(), 55);
    }
}
