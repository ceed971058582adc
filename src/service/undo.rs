use dashmap::DashMap;

use crate::model::SlideNumber;

/// Prior editor contents per slide, popped last-in first-out.
#[derive(Debug, Default)]
pub struct UndoStack {
    stacks: DashMap<SlideNumber, Vec<String>>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `prior` unless it equals the top of the slide's stack.
    pub fn record_if_changed(&self, slide: SlideNumber, prior: &str) -> bool {
        let mut stack = self.stacks.entry(slide).or_default();
        if stack.last().map(String::as_str) == Some(prior) {
            return false;
        }

        stack.push(prior.to_string());
        true
    }

    pub fn pop(&self, slide: SlideNumber) -> Option<String> {
        self.stacks.get_mut(&slide)?.pop()
    }

    pub fn clear(&self, slide: SlideNumber) {
        self.stacks.remove(&slide);
    }

    pub fn depth(&self, slide: SlideNumber) -> usize {
        self.stacks.get(&slide).map_or(0, |stack| stack.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_states_collapse() {
        let undo = UndoStack::new();

        assert!(undo.record_if_changed(1, "a"));
        assert!(!undo.record_if_changed(1, "a"));
        assert!(undo.record_if_changed(1, "ab"));

        assert_eq!(undo.depth(1), 2);
    }

    #[test]
    fn stacks_are_scoped_per_slide() {
        let undo = UndoStack::new();
        undo.record_if_changed(1, "first");
        undo.record_if_changed(2, "second");

        assert_eq!(undo.pop(2).as_deref(), Some("second"));
        assert_eq!(undo.pop(2), None);
        assert_eq!(undo.pop(1).as_deref(), Some("first"));
    }

    #[test]
    fn clear_drops_the_slides_history() {
        let undo = UndoStack::new();
        undo.record_if_changed(3, "x");
        undo.clear(3);

        assert_eq!(undo.depth(3), 0);
        assert_eq!(undo.pop(3), None);
    }
}
