/// Decides on which frames the scene is reconciled.
///
/// Rendering happens every frame; reconciliation only every `every`-th frame,
/// or on the next frame after [`force`](Self::force) (new configuration or
/// state pushed by the host). Frame 0 always reconciles.
#[derive(Debug, Clone)]
pub struct ReconcileCadence {
    every: u64,
    forced: bool,
}

impl ReconcileCadence {
    pub const DEFAULT_EVERY: u64 = 10;

    /// `every` is clamped to at least 1 (reconcile every frame).
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1), forced: true }
    }

    pub fn every(&self) -> u64 {
        self.every
    }

    pub fn force(&mut self) {
        self.forced = true;
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    /// Returns whether `frame_index` should reconcile, consuming a pending force.
    pub fn should_reconcile(&mut self, frame_index: u64) -> bool {
        std::mem::take(&mut self.forced) || frame_index % self.every == 0
    }
}

impl Default for ReconcileCadence {
    fn default() -> Self {
        Self::new(Self::DEFAULT_EVERY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_nth_frame() {
        let mut c = ReconcileCadence::new(3);
        let hits: Vec<u64> = (0..10).filter(|&f| c.should_reconcile(f)).collect();
        assert_eq!(hits, [0, 3, 6, 9]);
    }

    #[test]
    fn force_applies_to_next_frame_only() {
        let mut c = ReconcileCadence::new(10);
        assert!(c.should_reconcile(0));
        assert!(!c.should_reconcile(1));
        c.force();
        assert!(c.should_reconcile(2));
        assert!(!c.should_reconcile(3));
    }

    #[test]
    fn zero_means_every_frame() {
        let mut c = ReconcileCadence::new(0);
        assert!((0..5).all(|f| c.should_reconcile(f)));
    }
}
