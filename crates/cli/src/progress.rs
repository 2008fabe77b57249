//! Single-line progress reporting on stderr. The line is overwritten in
//! place and disabled entirely when stderr is not a terminal or --quiet is
//! set.

use console::{style, Term};

use kopy_copier::Progress;

pub struct ProgressReporter {
    term: Term,
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(quiet: bool) -> Self {
        let term = Term::stderr();
        let enabled = !quiet && term.is_term();
        Self { term, enabled }
    }

    fn write(&self, msg: &str) {
        if !self.enabled {
            return;
        }
        let _ = self.term.clear_line();
        let _ = self.term.write_str(&format!("  {}", style(msg).dim()));
    }

    /// Remove the progress line before printing real output.
    pub fn clear(&self) {
        if self.enabled {
            let _ = self.term.clear_line();
        }
    }
}

impl Progress for ProgressReporter {
    fn connecting(&self) {
        self.write("Connecting to cluster...");
    }

    fn discovering(&self) {
        self.write("Discovering dependencies...");
    }

    fn discovered(&self, count: usize) {
        if count == 0 {
            self.write("No additional dependencies found.");
        } else {
            self.write(&format!("Found {count} related resource(s)."));
        }
    }

    fn fetching(&self, display_name: &str, namespace: &str) {
        self.write(&format!("Fetching {display_name} from {namespace}..."));
    }

    fn sanitizing(&self, display_name: &str) {
        self.write(&format!("Sanitizing {display_name}..."));
    }

    fn checking(&self, display_name: &str) {
        self.write(&format!("Checking conflicts for {display_name}..."));
    }

    fn creating(&self, display_name: &str, namespace: &str) {
        self.write(&format!("Creating {display_name} in {namespace}..."));
    }
}
