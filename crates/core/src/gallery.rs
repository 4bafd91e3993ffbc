//! In-memory collection of labelled templates.

use std::collections::HashMap;

use fprint_runtime::Template;
use tracing::debug;

/// Label for the `sequence`-th verified enrollment (1-based).
pub fn enrollment_label(sequence: usize) -> String {
	format!("print-{sequence}")
}

/// Identification search space: label to enrolled template.
///
/// Insertion order is irrelevant. Dropping the gallery releases its templates.
#[derive(Debug, Default)]
pub struct Gallery {
	entries: HashMap<String, Template>,
}

impl Gallery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts unconditionally; a duplicate label replaces the earlier template,
	/// which is returned.
	pub fn add(&mut self, label: impl Into<String>, template: Template) -> Option<Template> {
		self.entries.insert(label.into(), template)
	}

	pub fn get(&self, label: &str) -> Option<&Template> {
		self.entries.get(label)
	}

	pub fn contains(&self, label: &str) -> bool {
		self.entries.contains_key(label)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Labels sorted for stable output.
	pub fn labels(&self) -> Vec<&str> {
		let mut labels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
		labels.sort_unstable();
		labels
	}

	/// Borrowed view handed to a single identify call.
	pub fn snapshot(&self) -> Vec<(&str, &Template)> {
		let mut snapshot: Vec<(&str, &Template)> = self.entries.iter().map(|(label, template)| (label.as_str(), template)).collect();
		snapshot.sort_unstable_by(|a, b| a.0.cmp(b.0));
		snapshot
	}

	/// Releases every stored template. Idempotent; returns how many were released.
	pub fn dispose(&mut self) -> usize {
		let released = self.entries.len();
		self.entries.clear();
		if released > 0 {
			debug!(target = "fprint.session", released, "gallery disposed");
		}
		released
	}
}

impl Drop for Gallery {
	fn drop(&mut self) {
		self.dispose();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn template(finger: u32) -> Template {
		Template::new("sim", finger.to_le_bytes().to_vec())
	}

	#[test]
	fn labels_are_one_based_sequence_numbers() {
		assert_eq!(enrollment_label(1), "print-1");
		assert_eq!(enrollment_label(12), "print-12");
	}

	#[test]
	fn duplicate_label_overwrites() {
		let mut gallery = Gallery::new();
		assert!(gallery.add("print-1", template(1)).is_none());
		let previous = gallery.add("print-1", template(2));
		assert_eq!(previous, Some(template(1)));
		assert_eq!(gallery.len(), 1);
		assert_eq!(gallery.get("print-1"), Some(&template(2)));
	}

	#[test]
	fn snapshot_and_labels_are_sorted() {
		let mut gallery = Gallery::new();
		gallery.add("print-2", template(2));
		gallery.add("print-1", template(1));
		assert_eq!(gallery.labels(), vec!["print-1", "print-2"]);
		let snapshot = gallery.snapshot();
		assert_eq!(snapshot[0].0, "print-1");
		assert_eq!(snapshot[1].1, &template(2));
	}

	#[test]
	fn dispose_is_idempotent() {
		let mut gallery = Gallery::new();
		gallery.add("print-1", template(1));
		assert_eq!(gallery.dispose(), 1);
		assert_eq!(gallery.dispose(), 0);
		assert!(gallery.is_empty());
	}
}
