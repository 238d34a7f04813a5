//! # Seisresp Core
//!
//! Deterministic engine for evaluating the complex frequency response of a
//! seismic recording channel.
//!
//! A [`Response`] is an ordered cascade of stages (poles/zeros, coefficient
//! filters, tabulated lists, polynomials, decimators and scalar gains). The
//! [`Cascade`] multiplies the per-stage contributions at every frequency of
//! a [`FrequencyGrid`], applies overall normalization and an optional
//! ground-motion unit transform, and reports per-frequency failures without
//! aborting the sweep. [`assemble`] formats the result for output.
//!
//! The crate performs no I/O and holds no global state.
//!
//! ```
//! use seisresp_core::{
//!     Cascade, CascadeOptions, FrequencyGrid, PolesZeros, Response, Stage, UnitTable,
//! };
//!
//! let response = Response::builder()
//!     .units("M/S", "COUNTS")
//!     .stage(Stage::PolesZeros(PolesZeros::new(vec![], vec![], 1.0)))
//!     .stage(Stage::gain(1500.0, 1.0))
//!     .build()?;
//!
//! let table = UnitTable::standard();
//! let cascade = Cascade::new(&response, &CascadeOptions::default(), &table)?;
//! let evaluated = cascade.evaluate(&FrequencyGrid::linear(1.0, 10.0, 10))?;
//! assert_eq!(evaluated.points.len(), 10);
//! # Ok::<(), seisresp_core::ResponseError>(())
//! ```

pub mod assembler;
pub mod cascade;
pub mod complex;
pub mod error;
pub mod evaluator;
pub mod grid;
pub mod response;
pub mod stage;
pub mod units;

pub use assembler::{
    AmplitudeScale, AssembledResponse, AssembledRow, OutputFormat, PhaseUnit, RowFailure, assemble,
};
pub use cascade::{
    Cascade, CascadeOptions, CascadeWarning, DEFAULT_SENSITIVITY_TOLERANCE, EvaluatedPoint,
    EvaluatedResponse, NormalizationMode, StageFailure, evaluate_batch, evaluate_response,
};
pub use complex::{Complex64, ComplexExt};
pub use error::{ResponseError, Result};
pub use evaluator::{StageContext, computed_normalization, evaluate_stage};
pub use grid::{FrequencyGrid, GridIter, Spacing};
pub use response::{ChannelId, Epoch, Response, ResponseBuilder, Sensitivity};
pub use stage::{
    CoefficientType, Coefficients, Decimation, DelayMode, FirSymmetry, Gain, PolesZeros,
    Polynomial, ResponseList, ResponseListEntry, Stage, TransferFunctionType,
};
pub use units::{GroundMotion, UnitConversion, UnitInfo, UnitKind, UnitTable, derivative_order};
