//! Strongest-chain hub - ordered, lossless tip fan-out
//!
//! A single producer (the consensus engine) publishes every accepted
//! strongest block; any number of independently-paced consumers each
//! observe the full publish-order sequence from the moment they
//! subscribed. Delivery uses one bounded queue per subscriber, so a
//! slow consumer eventually suspends the publisher instead of losing
//! or coalescing items.

mod hub;

pub use hub::{StrongestChainHub, SubscriberId, TipSubscription, DEFAULT_QUEUE_CAPACITY};
