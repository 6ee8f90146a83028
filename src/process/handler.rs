/// Marker printed by exiftool in stay-open mode once a command is fully answered.
pub const READY_MARKER: &str = "{ready}";

/// Consumer of the lines printed by exiftool.
///
/// `read_line` is called once per line, and with `None` when the stream has ended.
/// Returning `false` stops the read loop. Stopping on a `Some` line leaves the stream
/// open for the next command; only end-of-stream closes it.
pub trait OutputHandler {
    fn read_line(&mut self, line: Option<&str>) -> bool;
}

impl<F> OutputHandler for F
where
    F: FnMut(Option<&str>) -> bool,
{
    fn read_line(&mut self, line: Option<&str>) -> bool {
        self(line)
    }
}

/// True when `line` terminates an exiftool answer: either the stream ended or the
/// stay-open `{ready}` marker was printed.
pub fn is_end_of_output(line: Option<&str>) -> bool {
    match line {
        None => true,
        Some(line) => line == READY_MARKER,
    }
}

/// Collects every line of one answer, stopping on `{ready}` or end-of-stream.
#[derive(Debug, Default)]
pub struct CollectHandler {
    lines: Vec<String>,
}

impl CollectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl OutputHandler for CollectHandler {
    fn read_line(&mut self, line: Option<&str>) -> bool {
        if is_end_of_output(line) {
            return false;
        }
        if let Some(line) = line {
            self.lines.push(line.to_string());
        }
        true
    }
}

/// Collects the whole output of a one-shot command, until end-of-stream.
#[derive(Debug, Default)]
pub(crate) struct ResultHandler {
    output: String,
}

impl ResultHandler {
    pub(crate) fn output(self) -> String {
        self.output
    }
}

impl OutputHandler for ResultHandler {
    fn read_line(&mut self, line: Option<&str>) -> bool {
        match line {
            Some(line) => {
                if !self.output.is_empty() {
                    self.output.push('\n');
                }
                self.output.push_str(line);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_output() {
        assert!(is_end_of_output(None));
        assert!(is_end_of_output(Some("{ready}")));
        assert!(!is_end_of_output(Some("{ready} ")));
        assert!(!is_end_of_output(Some("Make: Huawei")));
    }

    #[test]
    fn test_collect_handler_stops_on_ready() {
        let mut handler = CollectHandler::new();
        assert!(handler.read_line(Some("Make: Huawei")));
        assert!(handler.read_line(Some("Model: Nexus 6P")));
        assert!(!handler.read_line(Some("{ready}")));
        assert_eq!(handler.lines(), ["Make: Huawei", "Model: Nexus 6P"]);
    }

    #[test]
    fn test_collect_handler_stops_on_end_of_stream() {
        let mut handler = CollectHandler::new();
        assert!(handler.read_line(Some("12.40")));
        assert!(!handler.read_line(None));
        assert_eq!(handler.into_lines(), vec!["12.40".to_string()]);
    }

    #[test]
    fn test_result_handler_joins_lines() {
        let mut handler = ResultHandler::default();
        assert!(handler.read_line(Some("first")));
        // `{ready}` has no special meaning for one-shot output
        assert!(handler.read_line(Some("{ready}")));
        assert!(handler.read_line(Some("last")));
        assert!(!handler.read_line(None));
        assert_eq!(handler.output(), "first\n{ready}\nlast");
    }

    #[test]
    fn test_closure_handler() {
        let mut seen = 0;
        let mut handler = |line: Option<&str>| {
            seen += 1;
            line.is_some()
        };
        assert!(handler.read_line(Some("a")));
        assert!(!handler.read_line(None));
        assert_eq!(seen, 2);
    }
}
