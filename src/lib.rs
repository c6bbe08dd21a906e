//! # graphsynth — Synthetic Knowledge-Graph Generator
//!
//! Instantiates artificial knowledge-graph instances from declarative
//! templates: entities ("things"), relationships between them, and
//! constraints over their attribute values (equality, inequality, string
//! containment, temporal offset, geodesic distance).
//!
//! ## Design Principles
//!
//! 1. **One owner per pass**: a `Resolver` owns its template for the whole
//!    resolution pass — no shared mutable template state
//! 2. **Explicit randomness**: every run threads one seeded `RunRng`; there
//!    is no global random state
//! 3. **Traits at the seams**: `ValueGenerator`, `StatsSource`,
//!    `DatumFormatter` and `GeocodeLookup` are the collaborator boundaries
//! 4. **Log, don't raise**: unsatisfiable geo/temporal bounds degrade to a
//!    logged best-effort assignment; only malformed templates abort
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphsynth::{RunParams, Synthesizer};
//! use graphsynth::template::Template;
//!
//! # fn example() -> graphsynth::Result<()> {
//! let template = Template::from_str(r#"{
//!     "id": "meeting",
//!     "thingSpecs": [
//!         { "id": "a", "schemaClass": "Person" },
//!         { "id": "b", "schemaClass": "Person" }
//!     ],
//!     "comparisonConstraints": [{
//!         "thing1": "a", "thing2": "b",
//!         "schemaAttribute1": "personName", "schemaAttribute2": "personName",
//!         "constraint": { "predicate": "EQUALS" }
//!     }]
//! }"#)?;
//!
//! let params = RunParams::new(40.0, -75.0, 7, 1_600_000_000);
//! let synthesis = Synthesizer::new().synthesize(template, &params)?;
//!
//! for triple in &synthesis.triples {
//!     println!("{triple}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module | Role |
//! |-------|--------|------|
//! | Merge | `template::merger` | unify entities across nested fragments |
//! | Resolve | `resolver` | assign entity values and attribute values |
//! | Propagate | `propagate` | transitive geo/temporal constraint graphs |
//! | Project | `project` | emit the deduplicated triple set |

// ============================================================================
// Modules
// ============================================================================

pub mod generate;
pub mod lookup;
pub mod model;
pub mod project;
pub mod propagate;
pub mod resolver;
pub mod rng;
pub mod template;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    AttrConstraint, AttrKind, AttrValue, Attribute, Comparison, ComparisonKind, ConstraintOp,
    GeoPoint, RelationshipSpec, ThingSpec,
};

// ============================================================================
// Re-exports: Pipeline stages
// ============================================================================

pub use generate::{FrequencyGenerator, RandomGenerator, ValueGenerator};
pub use project::{DatumFormatter, Partial, PartialMode, PlainFormatter, ProjectOptions, Triple};
pub use resolver::{ResolveOptions, Resolver, RunContext};
pub use rng::RunRng;
pub use template::{ComponentLibrary, Dialect, Template};

// ============================================================================
// Re-exports: Collaborator boundaries
// ============================================================================

pub use lookup::{AddressFields, GeocodeLookup, PropertyTypeRegistry, StatsCache, StatsSource};

use chrono::DateTime;

// ============================================================================
// Run parameters
// ============================================================================

/// Everything one synthesis run depends on besides the template itself.
///
/// A run is a pure function of (template, anchor, seed, reference time,
/// difficulty) plus its random stream — independent runs share no mutable
/// state and are embarrassingly parallel at the process level.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Anchor latitude for freshly placed geo attributes.
    pub lat: f64,
    /// Anchor longitude.
    pub lon: f64,
    /// Seed of the run's random stream.
    pub seed: u64,
    /// Reference unix timestamp temporal attributes derive from.
    pub reference_time: i64,
    /// Tuning scalar in [0, 1] forwarded to the value generator.
    pub difficulty: f64,
    /// Propagation toggles; `None` picks the template dialect's defaults.
    pub resolve: Option<ResolveOptions>,
    /// Projection options (trim, partial emission).
    pub project: ProjectOptions,
}

impl RunParams {
    pub fn new(lat: f64, lon: f64, seed: u64, reference_time: i64) -> Self {
        Self {
            lat,
            lon,
            seed,
            reference_time,
            difficulty: 0.5,
            resolve: None,
            project: ProjectOptions::default(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_resolve(mut self, options: ResolveOptions) -> Self {
        self.resolve = Some(options);
        self
    }

    pub fn with_project(mut self, options: ProjectOptions) -> Self {
        self.project = options;
        self
    }
}

/// Terminal output of one run: the resolved template and its triple set.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub template: Template,
    pub triples: Vec<Triple>,
    /// Traceable answer-key prefix shared by every emitted entity.
    pub origin_source: String,
}

// ============================================================================
// Top-level Synthesizer handle
// ============================================================================

/// The primary entry point. A `Synthesizer` wraps a value generator and a
/// datum formatter and runs templates through the full pipeline.
pub struct Synthesizer<G: ValueGenerator> {
    generator: G,
    formatter: Box<dyn DatumFormatter>,
}

impl Synthesizer<RandomGenerator> {
    /// Synthesizer with the default pseudo-random generator and plain
    /// literal formatting.
    pub fn new() -> Self {
        Self::with_generator(RandomGenerator)
    }
}

impl Default for Synthesizer<RandomGenerator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: ValueGenerator> Synthesizer<G> {
    pub fn with_generator(generator: G) -> Self {
        Self { generator, formatter: Box::new(PlainFormatter) }
    }

    pub fn with_formatter(mut self, formatter: Box<dyn DatumFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Run one template through merge → resolve → project.
    pub fn synthesize(&self, template: Template, params: &RunParams) -> Result<Synthesis> {
        let difficulty = params.difficulty.clamp(0.0, 1.0);
        let reference_time = DateTime::from_timestamp(params.reference_time, 0)
            .ok_or_else(|| Error::InvalidParam(format!(
                "reference timestamp {} out of range",
                params.reference_time
            )))?;

        let origin_source = format!(
            "{}|{}|{}.{}",
            template.id, difficulty, params.seed, params.reference_time
        );
        let options = params
            .resolve
            .unwrap_or_else(|| ResolveOptions::for_dialect(template.dialect));
        let ctx = RunContext {
            origin_source: origin_source.clone(),
            anchor: GeoPoint::new(params.lat, params.lon),
            reference_time,
            difficulty,
        };

        tracing::debug!(template = %ctx.origin_source, "starting synthesis run");
        let mut rng = RunRng::from_seed(params.seed);
        let template =
            Resolver::new(template, &self.generator, &mut rng, ctx, options).resolve()?;
        let triples = project::project(
            &template,
            &origin_source,
            self.formatter.as_ref(),
            &params.project,
            &mut rng,
        );

        Ok(Synthesis { template, triples, origin_source })
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed template: {0}")]
    MalformedTemplate(String),

    #[error("unknown thing: {0}")]
    UnknownThing(String),

    #[error("unknown component: {0}")]
    UnknownComponent(String),

    #[error("unresolved path: {0}")]
    UnresolvedPath(String),

    #[error("invalid run parameter: {0}")]
    InvalidParam(String),

    #[error("statistics lookup failed: {0}")]
    Stats(String),

    #[error("geocode lookup failed: {0}")]
    Geocode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
