//! Terminal device-selection prompt
//!
//! The USB platform asks [`PromptSelector`] to choose among attached devices.
//! The request is forwarded to the runner, which lists the candidates and
//! resolves it from the next stdin line.

use devlink_core::prelude::*;
use devlink_core::DeviceId;
use devlink_device::DeviceSelector;
use tokio::sync::{mpsc, oneshot};

/// A pending prompt; answering `None` cancels the selection
#[derive(Debug)]
pub struct SelectionRequest {
    pub candidates: Vec<DeviceId>,
    pub reply: oneshot::Sender<Option<DeviceId>>,
}

impl SelectionRequest {
    /// Resolve with the candidate at `index`, or cancel when out of range
    pub fn choose(self, index: Option<usize>) -> bool {
        let choice = index.and_then(|i| self.candidates.get(i).cloned());
        self.reply.send(choice).is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct PromptSelector {
    tx: mpsc::UnboundedSender<SelectionRequest>,
}

impl PromptSelector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SelectionRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DeviceSelector for PromptSelector {
    async fn select(&self, candidates: Vec<DeviceId>) -> Option<DeviceId> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(SelectionRequest { candidates, reply }).is_err() {
            warn!("Selection prompt unavailable, cancelling");
            return None;
        }
        rx.await.ok().flatten()
    }
}

/// Answer to a selection prompt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAnswer {
    /// Zero-based candidate index
    Choice(usize),
    Cancel,
    Invalid,
}

/// Parse a prompt answer; candidates are numbered from 1
pub fn parse_selection(line: &str, count: usize) -> SelectionAnswer {
    let trimmed = line.trim();
    match trimmed {
        "c" | "cancel" | "q" => SelectionAnswer::Cancel,
        "" if count == 1 => SelectionAnswer::Choice(0),
        _ => match trimmed.parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => SelectionAnswer::Choice(n - 1),
            _ => SelectionAnswer::Invalid,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("2", 3), SelectionAnswer::Choice(1));
        assert_eq!(parse_selection(" 1 \n", 1), SelectionAnswer::Choice(0));
        assert_eq!(parse_selection("cancel", 3), SelectionAnswer::Cancel);
        assert_eq!(parse_selection("0", 3), SelectionAnswer::Invalid);
        assert_eq!(parse_selection("4", 3), SelectionAnswer::Invalid);
        assert_eq!(parse_selection("abc", 3), SelectionAnswer::Invalid);
    }

    #[test]
    fn test_empty_line_picks_only_candidate() {
        assert_eq!(parse_selection("", 1), SelectionAnswer::Choice(0));
        assert_eq!(parse_selection("", 2), SelectionAnswer::Invalid);
    }

    #[tokio::test]
    async fn test_select_forwards_to_prompt() {
        let (selector, mut requests) = PromptSelector::new();
        let devices = vec![DeviceId::new("0123"), DeviceId::new("4567")];

        let task = tokio::spawn(async move { selector.select(devices).await });
        let request = requests.recv().await.unwrap();
        assert_eq!(request.candidates.len(), 2);
        assert!(request.choose(Some(1)));

        assert_eq!(task.await.unwrap(), Some(DeviceId::new("4567")));
    }

    #[tokio::test]
    async fn test_select_cancelled() {
        let (selector, mut requests) = PromptSelector::new();

        let task = tokio::spawn(async move { selector.select(vec![DeviceId::new("0123")]).await });
        requests.recv().await.unwrap().choose(None);

        assert_eq!(task.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_select_without_prompt_cancels() {
        let (selector, requests) = PromptSelector::new();
        drop(requests);

        assert_eq!(selector.select(vec![DeviceId::new("0123")]).await, None);
    }
}
