use std::collections::HashSet;

use ratatui::widgets::ListState;

use feedmux::Item;

pub struct App {
    /// De-duplicated, reverse-chronological items.
    pub items: Vec<Item>,
    /// Fast lookup to avoid inserting duplicates.
    ///
    /// Subscriptions only de-duplicate per feed; the same story syndicated by
    /// two feeds is collapsed here.
    seen: HashSet<String>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Last status message.
    pub status: String,
}

impl App {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            list_state: ListState::default(),
            quit: false,
            status: "Starting…".into(),
        }
    }

    /// Merge newly-received items, de-duplicate, and re-sort.
    ///
    /// Returns how many items were actually new.
    pub fn merge_items(&mut self, new_items: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in new_items {
            if self.seen.insert(item.guid.clone()) {
                self.items.push(item);
            }
        }
        self.items.sort(); // uses Ord impl (reverse-chronological)
        self.items.len() - before
    }

    /// Record one item arriving from the merged subscription.
    pub fn receive(&mut self, item: Item) {
        let channel = item.channel.clone();
        if self.merge_items([item]) > 0 {
            self.status = format!("New item from {channel}");
        }
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.items.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.items.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.items.is_empty() {
            self.list_state.select(Some(self.items.len() - 1));
        }
    }
}
