/*
 * This modules contains the configuration of an `Ensemble`. The `EnsembleConfig` struct
 * implements the default trait and can be built step by step with `EnsembleConfigBuilder`.
*/
use crate::metrics::DivByZeroStrat;
use crate::schemes::SchemeType;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
/// Config struct used to simplify the inputs of the ensemble. It implements the default trait.
pub struct EnsembleConfig {
    /// Names of the taggers, highest priority first. When several tags get the same number of
    /// votes, the tag of the tagger listed first wins. Taggers missing from this list come after
    /// the listed ones, in registration order. An empty list keeps the registration order.
    pub priority: Vec<String>,
    /// Notation the taggers write their tags in. With `None`, every known notation is rewritten
    /// to BIO. A tagger can override it through `TokenTagger::scheme`.
    pub scheme: Option<SchemeType>,
    /// Should we move entity boundaries that leaked onto whitespace tokens?
    pub strip_entity_whitespace: bool,
    /// This parameter describe what to do when we encounter a division by zero when computing
    /// precision and recall. The most common solution is to replace the results by 0.
    pub zero_division: DivByZeroStrat,
    /// Can we use multiple cores to tag the sentences and compute the metrics? Sentences are
    /// independent of each other, so the work is split at the sentence level.
    pub parallel: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            priority: Vec::new(),
            scheme: None,
            strip_entity_whitespace: true,
            zero_division: DivByZeroStrat::ReplaceBy0,
            parallel: false,
        }
    }
}

impl Display for EnsembleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tagger priority: {:?}\n Scheme used: {:?}\n Strip whitespace from entities: {}\n Strategy when encountering a division by zero: {:?}\n Using parallel computations: {}", self.priority, self.scheme, self.strip_entity_whitespace, self.zero_division, self.parallel)
    }
}

impl<ZeroDiv, Scheme> From<EnsembleConfigBuilder<ZeroDiv, Scheme>> for EnsembleConfig
where
    ZeroDiv: Into<DivByZeroStrat>,
    Scheme: Into<SchemeType>,
{
    fn from(value: EnsembleConfigBuilder<ZeroDiv, Scheme>) -> Self {
        Self {
            priority: value.priority,
            scheme: value.scheme.map(|s| s.into()),
            strip_entity_whitespace: value.strip_entity_whitespace,
            zero_division: value.zero_division.either_into(),
            parallel: value.parallel,
        }
    }
}

/// This builder can be used to build and customize an `EnsembleConfig` structure.
pub struct EnsembleConfigBuilder<ZeroDiv, Scheme>
where
    ZeroDiv: Into<DivByZeroStrat>,
    Scheme: Into<SchemeType>,
{
    priority: Vec<String>,
    scheme: Option<Scheme>,
    strip_entity_whitespace: bool,
    zero_division: LeftOrRight<ZeroDiv, DivByZeroStrat>,
    parallel: bool,
}

impl Default for EnsembleConfigBuilder<DivByZeroStrat, SchemeType> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ZeroDiv, Scheme> EnsembleConfigBuilder<ZeroDiv, Scheme>
where
    ZeroDiv: Into<DivByZeroStrat>,
    Scheme: Into<SchemeType>,
{
    pub fn priority<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = names.into_iter().map(Into::into).collect();
        self
    }
    pub fn scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = Some(scheme);
        self
    }
    pub fn strip_entity_whitespace(mut self, strip: bool) -> Self {
        self.strip_entity_whitespace = strip;
        self
    }
    pub fn division_by_zero(mut self, division_by_zero: ZeroDiv) -> Self {
        self.zero_division = LeftOrRight::Left(division_by_zero);
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn new() -> Self {
        Self {
            priority: Vec::new(),
            scheme: None,
            strip_entity_whitespace: true,
            zero_division: LeftOrRight::Right(DivByZeroStrat::ReplaceBy0),
            parallel: false,
        }
    }
    pub fn build(self) -> EnsembleConfig {
        EnsembleConfig::from(self)
    }
}
