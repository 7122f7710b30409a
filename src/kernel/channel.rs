//! Broadcast channels - named cells folded with an associative combine,
//! reset once per round and observable only after the round resolves.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use thiserror::Error;

pub type CombineFn<V> = Box<dyn Fn(V, V) -> V + Send + Sync>;

/// A single broadcast cell.
///
/// `current` accumulates this round's emissions, `resolved` holds the fold
/// frozen at the end of the last fully resolved round.
pub struct Broadcast<V> {
    name: String,
    default: V,
    combine: CombineFn<V>,
    current: V,
    resolved: V,
    emissions: usize,
}

impl<V: Clone> Broadcast<V> {
    pub fn new(
        name: impl Into<String>,
        default: V,
        combine: impl Fn(V, V) -> V + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            current: default.clone(),
            resolved: default.clone(),
            default,
            combine: Box::new(combine),
            emissions: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_value(&self) -> &V {
        &self.default
    }

    /// Drop everything emitted so far and start a fresh fold from the default.
    pub fn reset(&mut self) {
        self.current = self.default.clone();
        self.emissions = 0;
    }

    pub fn emit(&mut self, value: V) {
        let folded = std::mem::replace(&mut self.current, self.default.clone());
        self.current = (self.combine)(folded, value);
        self.emissions += 1;
    }

    /// Freeze the round's fold. After this, `observe` yields it.
    pub fn resolve(&mut self) {
        self.resolved = std::mem::replace(&mut self.current, self.default.clone());
    }

    /// Fold of the emissions made since the last reset.
    pub fn pending(&self) -> &V {
        &self.current
    }

    /// Value of the last fully resolved round.
    pub fn observe(&self) -> &V {
        &self.resolved
    }

    pub fn emissions(&self) -> usize {
        self.emissions
    }
}

impl<V> fmt::Debug for Broadcast<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcast")
            .field("name", &self.name)
            .field("emissions", &self.emissions)
            .finish()
    }
}

/// Common combine functions.
pub mod combine {
    /// Later emissions replace earlier ones; `None` never erases a value.
    pub fn last_writer_wins<T>(earlier: Option<T>, later: Option<T>) -> Option<T> {
        later.or(earlier)
    }

    pub fn overwrite<T>(_earlier: T, later: T) -> T {
        later
    }

    pub fn presence(_earlier: (), _later: ()) {}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel #{0} is not registered on this bus")]
    Unknown(usize),
    #[error("value emitted into channel '{channel}' has the wrong type")]
    TypeMismatch { channel: String },
}

/// Typed handle for a channel registered on a [`Bus`].
pub struct ChannelKey<V> {
    index: usize,
    _value: PhantomData<fn() -> V>,
}

impl<V> ChannelKey<V> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _value: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<V> Clone for ChannelKey<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ChannelKey<V> {}

impl<V> PartialEq for ChannelKey<V> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<V> Eq for ChannelKey<V> {}

impl<V> Hash for ChannelKey<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<V> fmt::Debug for ChannelKey<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelKey(#{})", self.index)
    }
}

/// An emission buffered by a task until the round barrier.
pub struct Emission {
    channel: usize,
    value: Box<dyn Any + Send>,
}

impl Emission {
    pub fn new<V: Send + 'static>(key: ChannelKey<V>, value: V) -> Self {
        Self {
            channel: key.index,
            value: Box::new(value),
        }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }
}

impl fmt::Debug for Emission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emission")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

trait ErasedChannel: Send + Sync {
    fn name(&self) -> &str;
    fn reset(&mut self);
    fn resolve(&mut self);
    fn emissions(&self) -> usize;
    fn deliver(&mut self, value: Box<dyn Any + Send>) -> Result<(), ChannelError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<V: Clone + Send + Sync + 'static> ErasedChannel for Broadcast<V> {
    fn name(&self) -> &str {
        Broadcast::name(self)
    }

    fn reset(&mut self) {
        Broadcast::reset(self);
    }

    fn resolve(&mut self) {
        Broadcast::resolve(self);
    }

    fn emissions(&self) -> usize {
        Broadcast::emissions(self)
    }

    fn deliver(&mut self, value: Box<dyn Any + Send>) -> Result<(), ChannelError> {
        let value = value
            .downcast::<V>()
            .map_err(|_| ChannelError::TypeMismatch {
                channel: self.name.clone(),
            })?;
        self.emit(*value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Every channel of a simulation, keyed by typed handles.
#[derive(Default)]
pub struct Bus {
    channels: Vec<Box<dyn ErasedChannel>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<V: Clone + Send + Sync + 'static>(
        &mut self,
        name: impl Into<String>,
        default: V,
        combine: impl Fn(V, V) -> V + Send + Sync + 'static,
    ) -> ChannelKey<V> {
        let key = ChannelKey::new(self.channels.len());
        self.channels
            .push(Box::new(Broadcast::new(name, default, combine)));
        key
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Look up a channel, reporting keys that belong to another bus.
    pub fn try_channel<V: Clone + Send + Sync + 'static>(
        &self,
        key: ChannelKey<V>,
    ) -> Result<&Broadcast<V>, ChannelError> {
        let channel = self
            .channels
            .get(key.index)
            .ok_or(ChannelError::Unknown(key.index))?;
        channel
            .as_any()
            .downcast_ref::<Broadcast<V>>()
            .ok_or_else(|| ChannelError::TypeMismatch {
                channel: channel.name().to_string(),
            })
    }

    /// # Panics
    ///
    /// Panics if `key` was not issued by this bus. Use [`Bus::try_channel`]
    /// or [`Bus::try_observe`] for keys of unknown origin.
    pub fn channel<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> &Broadcast<V> {
        self.try_channel(key).expect("channel key was issued by this bus")
    }

    fn channel_mut<V: Clone + Send + Sync + 'static>(
        &mut self,
        key: ChannelKey<V>,
    ) -> &mut Broadcast<V> {
        self.channels
            .get_mut(key.index)
            .and_then(|channel| channel.as_any_mut().downcast_mut::<Broadcast<V>>())
            .expect("channel key was issued by this bus")
    }

    pub fn emit<V: Clone + Send + Sync + 'static>(&mut self, key: ChannelKey<V>, value: V) {
        self.channel_mut(key).emit(value);
    }

    /// Fold a buffered emission into its channel.
    pub fn deliver(&mut self, emission: Emission) -> Result<(), ChannelError> {
        let channel = self
            .channels
            .get_mut(emission.channel)
            .ok_or(ChannelError::Unknown(emission.channel))?;
        channel.deliver(emission.value)
    }

    /// The value resolved by the last round. Panics like [`Bus::channel`].
    pub fn observe<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> &V {
        self.channel(key).observe()
    }

    pub fn try_observe<V: Clone + Send + Sync + 'static>(
        &self,
        key: ChannelKey<V>,
    ) -> Result<&V, ChannelError> {
        self.try_channel(key).map(Broadcast::observe)
    }

    pub fn pending<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> &V {
        self.channel(key).pending()
    }

    pub fn emissions<V: Clone + Send + Sync + 'static>(&self, key: ChannelKey<V>) -> usize {
        self.channel(key).emissions()
    }

    pub fn total_emissions(&self) -> usize {
        self.channels.iter().map(|channel| channel.emissions()).sum()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|channel| channel.name())
    }

    pub fn reset_all(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    pub fn resolve_all(&mut self) {
        for channel in &mut self.channels {
            channel.resolve();
        }
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_channel() -> Broadcast<i64> {
        Broadcast::new("sum", 0, |a, b| a + b)
    }

    #[test]
    fn test_fold_and_resolve() {
        let mut channel = sum_channel();
        channel.emit(3);
        channel.emit(4);
        assert_eq!(*channel.pending(), 7);
        assert_eq!(*channel.observe(), 0, "unresolved folds stay hidden");
        assert_eq!(channel.emissions(), 2);

        channel.resolve();
        assert_eq!(*channel.observe(), 7);
    }

    #[test]
    fn test_reset_returns_to_default() {
        let mut channel = sum_channel();
        channel.emit(10);
        channel.resolve();
        channel.reset();
        assert_eq!(*channel.pending(), 0);
        assert_eq!(channel.emissions(), 0);
        assert_eq!(*channel.observe(), 10, "reset keeps the last resolved value");

        channel.resolve();
        assert_eq!(*channel.observe(), 0, "a silent round resolves to the default");
    }

    #[test]
    fn test_last_writer_wins_keeps_value_over_none() {
        let mut channel = Broadcast::new("click", None::<i32>, combine::last_writer_wins);
        channel.emit(Some(1));
        channel.emit(None);
        channel.emit(Some(2));
        channel.emit(None);
        channel.resolve();
        assert_eq!(*channel.observe(), Some(2));
    }

    #[test]
    fn test_bus_delivers_typed_emissions() {
        let mut bus = Bus::new();
        let sum = bus.register("sum", 0_i64, |a, b| a + b);
        let label = bus.register("label", String::new(), combine::overwrite);

        bus.deliver(Emission::new(sum, 5_i64)).unwrap();
        bus.deliver(Emission::new(label, "hello".to_string())).unwrap();
        bus.emit(sum, 2);
        assert_eq!(bus.total_emissions(), 3);

        bus.resolve_all();
        assert_eq!(*bus.observe(sum), 7);
        assert_eq!(bus.observe(label), "hello");
    }

    #[test]
    fn test_bus_rejects_mismatched_emission() {
        let mut other = Bus::new();
        let foreign = other.register("foreign", 0_u8, combine::overwrite);

        let mut bus = Bus::new();
        bus.register("sum", 0_i64, |a, b| a + b);

        let err = bus.deliver(Emission::new(foreign, 1_u8)).unwrap_err();
        assert_eq!(
            err,
            ChannelError::TypeMismatch {
                channel: "sum".into()
            }
        );

        let missing = ChannelKey::<i64>::new(9);
        assert_eq!(
            bus.deliver(Emission::new(missing, 1)).unwrap_err(),
            ChannelError::Unknown(9)
        );
    }

    #[test]
    fn test_try_observe_reports_foreign_keys() {
        let mut other = Bus::new();
        let foreign = other.register("foreign", 0_u8, combine::overwrite);
        let unknown = other.register("unknown", 0_u8, combine::overwrite);

        let mut bus = Bus::new();
        let sum = bus.register("sum", 0_i64, |a, b| a + b);

        assert_eq!(bus.try_observe(sum), Ok(&0));
        assert_eq!(
            bus.try_observe(foreign),
            Err(ChannelError::TypeMismatch {
                channel: "sum".into()
            })
        );
        assert_eq!(bus.try_observe(unknown), Err(ChannelError::Unknown(1)));
    }

    #[test]
    #[should_panic(expected = "channel key was issued by this bus")]
    fn test_observe_panics_on_foreign_key() {
        let mut other = Bus::new();
        let foreign = other.register("foreign", 0_u8, combine::overwrite);

        let mut bus = Bus::new();
        bus.register("sum", 0_i64, |a, b| a + b);
        let _ = bus.observe(foreign);
    }
}
