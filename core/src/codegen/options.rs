/// Which instruction closes a protected region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TryEndAnchor {
    /// The try region ends at the first instruction of its handler. Only
    /// sound when the handler is laid out right after the try body, which
    /// the block scheduler arranges.
    #[default]
    HandlerStart,
    /// The try region ends right after the last instruction of the try body
    /// with the highest offset.
    TryBodyEnd,
}

/// Code generation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenOptions {
    /// How the end of every try region is anchored.
    pub try_end: TryEndAnchor,
    /// Reject instruction expressions whose template does not leave exactly
    /// the number of values their static type declares.
    pub check_net_stack_effect: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            try_end: TryEndAnchor::default(),
            check_net_stack_effect: true,
        }
    }
}
