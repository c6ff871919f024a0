use vrp_ir::IrError;

/// Errors surfaced by the value range propagation solver and pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VrpError {
    #[error(transparent)]
    Ir(#[from] IrError),
    /// The solver processed more worklist items than permitted.
    ///
    /// Every range has been reset to VARYING when this is returned, so the store remains sound.
    #[error("range propagation did not converge within {limit} steps")]
    IterationLimit { limit: usize },
}
