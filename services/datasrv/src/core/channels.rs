//! Channel collection
//!
//! An ordered bag of channel handles with the grouping and filtering the
//! orchestrator dispatches by: per-reader-connector, per-logger-connector,
//! or any caller-supplied key. Grouping preserves first-seen order so task
//! dispatch is deterministic.

use crate::core::channel::{Channel, ChannelState};
use crate::core::frame::TimeFrame;

/// Ordered collection of channel handles
#[derive(Debug, Clone, Default)]
pub struct Channels {
    items: Vec<Channel>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, channel: Channel) {
        self.items.push(channel);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.items.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Channel> {
        self.items.iter().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|c| c.id().to_string()).collect()
    }

    /// Channels matching a predicate, order preserved
    pub fn filter(&self, predicate: impl Fn(&Channel) -> bool) -> Channels {
        self.items
            .iter()
            .filter(|c| predicate(c))
            .cloned()
            .collect()
    }

    /// Group by a caller-supplied key; channels yielding no key are skipped.
    /// Groups keep first-seen order.
    pub fn group_by(&self, key: impl Fn(&Channel) -> Option<String>) -> Vec<(String, Channels)> {
        let mut groups: Vec<(String, Channels)> = Vec::new();
        for channel in &self.items {
            let Some(k) = key(channel) else { continue };
            match groups.iter_mut().find(|(g, _)| *g == k) {
                Some((_, group)) => group.push(channel.clone()),
                None => {
                    let mut group = Channels::new();
                    group.push(channel.clone());
                    groups.push((k, group));
                },
            }
        }
        groups
    }

    /// Group by the reader binding's connector id
    pub fn group_by_reader(&self) -> Vec<(String, Channels)> {
        self.group_by(|c| c.reader().map(|b| b.connector().to_string()))
    }

    /// Group by the logger binding's connector id
    pub fn group_by_logger(&self) -> Vec<(String, Channels)> {
        self.group_by(|c| c.logger().map(|b| b.connector().to_string()))
    }

    /// Channels that reference the given connector as reader or logger
    pub fn bound_to(&self, connector: &str) -> Channels {
        self.filter(|c| {
            c.reader().map(|b| b.connector() == connector).unwrap_or(false)
                || c.logger().map(|b| b.connector() == connector).unwrap_or(false)
        })
    }

    /// Transition every channel in the bag
    pub fn set_state_all(&self, state: ChannelState) {
        for channel in &self.items {
            channel.set_state(state);
        }
    }

    /// Flatten current VALID values into one wide time-indexed frame keyed
    /// by channel id
    pub fn to_frame(&self) -> TimeFrame {
        let mut frame = TimeFrame::new();
        for channel in &self.items {
            if !channel.is_valid() {
                continue;
            }
            if let Some(value) = channel.value() {
                frame.insert(channel.timestamp(), channel.id(), value);
            }
        }
        frame
    }
}

impl FromIterator<Channel> for Channels {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Channels {
    type Item = Channel;
    type IntoIter = std::vec::IntoIter<Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Channels {
    type Item = &'a Channel;
    type IntoIter = std::slice::Iter<'a, Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::core::value::Value;

    fn channel(id: &str, reader: Option<&str>, logger: Option<&str>) -> Channel {
        let mut config = ChannelConfig::new(id);
        if let Some(r) = reader {
            config = config.with_reader(r);
        }
        if let Some(l) = logger {
            config = config.with_logger(l);
        }
        Channel::from_config(&config).unwrap()
    }

    #[test]
    fn test_group_by_reader_order() {
        let channels: Channels = [
            channel("a", Some("one"), None),
            channel("b", Some("two"), None),
            channel("c", Some("one"), None),
            channel("d", None, Some("two")),
        ]
        .into_iter()
        .collect();

        let groups = channels.group_by_reader();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "one");
        assert_eq!(groups[0].1.ids(), vec!["a", "c"]);
        assert_eq!(groups[1].0, "two");
        // The reader-less channel is skipped
        assert_eq!(groups[1].1.ids(), vec!["b"]);
    }

    #[test]
    fn test_bound_to() {
        let channels: Channels = [
            channel("a", Some("one"), None),
            channel("b", None, Some("one")),
            channel("c", Some("two"), None),
        ]
        .into_iter()
        .collect();

        assert_eq!(channels.bound_to("one").ids(), vec!["a", "b"]);
        assert_eq!(channels.bound_to("two").ids(), vec!["c"]);
    }

    #[test]
    fn test_to_frame_only_valid() {
        let channels: Channels = [channel("a", None, None), channel("b", None, None)]
            .into_iter()
            .collect();
        channels.get("a").unwrap().set_value(Value::from(1.0)).unwrap();

        let frame = channels.to_frame();
        assert_eq!(frame.columns(), vec!["a".to_string()]);
    }

    #[test]
    fn test_set_state_all() {
        let channels: Channels = [channel("a", None, None), channel("b", None, None)]
            .into_iter()
            .collect();
        channels.set_state_all(ChannelState::Connecting);
        assert!(channels.iter().all(|c| c.state() == ChannelState::Connecting));
    }
}
