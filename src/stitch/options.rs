//! Stitch configuration.

/// How children of the same parent are matched across inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChildMatching {
    /// Match by name. Inputs lacking a child leave an empty slot.
    #[default]
    ByName,
    /// Match by position. Every input must have the same child count at
    /// every level.
    ByIndex,
}

/// What to do when one input's property disagrees with the others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Leave the input out of that property and record the skip.
    #[default]
    SkipOnMismatch,
    /// Fail on data type mismatches.
    Strict,
}

/// Options for a stitch run.
#[derive(Clone, Debug)]
pub struct StitchOptions {
    pub identity: ChildMatching,
    pub merge_policy: MergePolicy,
    /// Output compression hint (-1 = none, 0-9 = zlib level).
    pub compression: i32,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            identity: ChildMatching::ByName,
            merge_policy: MergePolicy::SkipOnMismatch,
            compression: -1,
        }
    }
}

impl StitchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: ChildMatching) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression = level.clamp(-1, 9);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.merge_policy == MergePolicy::Strict
    }
}
