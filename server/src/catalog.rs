//! Token catalog and rarity-weighted deck sampling
//!
//! The catalog is the read-only registry of token definitions, loaded once at
//! startup and indexed by ID and by rarity tier. It is also the only place
//! instance IDs are minted: each drawn token pairs its definition ID with a
//! monotonically increasing counter, so every instance handed out over the
//! lifetime of the server is unique.

use log::warn;
use rand::Rng;
use shared::{TokenDefinition, TokenInstance, TokenRarity};
use std::collections::HashMap;
use std::fmt;

/// Rarity weights walked in `TokenRarity::ALL` order. Must sum to 1.0.
pub const DEFAULT_RARITY_DISTRIBUTION: [f64; 4] = [0.6, 0.3, 0.08, 0.02];

/// Per-definition duplicate cap. High enough to be non-binding for a
/// standard 24-token draw.
pub const DEFAULT_MAX_PER_ID: u32 = 30;

/// Upper bound on sampling retries before a draw is declared exhausted.
/// Retries happen when an empty tier is hit or a definition is at its cap,
/// so hitting this bound means the catalog cannot satisfy the request.
const MAX_DRAW_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Weight per rarity tier, indexed in `TokenRarity::ALL` order.
    pub distribution: [f64; 4],
    /// Maximum copies of any single definition in one selection.
    pub max_per_id: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            distribution: DEFAULT_RARITY_DISTRIBUTION,
            max_per_id: DEFAULT_MAX_PER_ID,
        }
    }
}

#[derive(Debug)]
pub enum CatalogError {
    EmptyCatalog,
    MalformedDistribution { total: f64 },
    SamplerExhausted { requested: usize, drawn: usize },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::EmptyCatalog => write!(f, "token catalog has no definitions"),
            CatalogError::MalformedDistribution { total } => {
                write!(f, "rarity distribution sums to {} instead of 1.0", total)
            }
            CatalogError::SamplerExhausted { requested, drawn } => write!(
                f,
                "sampler exhausted after {} of {} requested tokens",
                drawn, requested
            ),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Static registry of token definitions plus the authoritative sampler.
pub struct TokenCatalog {
    by_rarity: HashMap<TokenRarity, Vec<TokenDefinition>>,
    by_id: HashMap<String, TokenDefinition>,
    config: SamplerConfig,
    next_instance_id: u64,
}

impl TokenCatalog {
    pub fn new(
        definitions: Vec<TokenDefinition>,
        config: SamplerConfig,
    ) -> Result<Self, CatalogError> {
        if definitions.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        let total: f64 = config.distribution.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(CatalogError::MalformedDistribution { total });
        }

        let mut by_rarity: HashMap<TokenRarity, Vec<TokenDefinition>> = HashMap::new();
        for rarity in TokenRarity::ALL {
            by_rarity.insert(rarity, Vec::new());
        }

        let mut by_id = HashMap::new();
        for definition in definitions {
            if let Some(tier) = by_rarity.get_mut(&definition.rarity) {
                tier.push(definition.clone());
            }
            by_id.insert(definition.id.clone(), definition);
        }

        Ok(Self {
            by_rarity,
            by_id,
            config,
            next_instance_id: 0,
        })
    }

    pub fn definition(&self, token_id: &str) -> Option<&TokenDefinition> {
        self.by_id.get(token_id)
    }

    pub fn definition_count(&self) -> usize {
        self.by_id.len()
    }

    /// Picks a rarity tier by walking the weight table in fixed order and
    /// subtracting each weight from a uniform [0,1) draw until it goes
    /// non-positive. Floating-point residue falls through to the last tier,
    /// so the pick always yields a valid rarity.
    fn weighted_rarity(&self, rng: &mut impl Rng) -> TokenRarity {
        let mut remaining: f64 = rng.gen();

        for (rarity, weight) in TokenRarity::ALL.iter().zip(self.config.distribution) {
            remaining -= weight;
            if remaining <= 0.0 {
                return *rarity;
            }
        }

        TokenRarity::ALL[TokenRarity::ALL.len() - 1]
    }

    /// Draws `count` token instances: weighted rarity pick, uniform pick
    /// within the tier, retry on empty tiers and capped definitions.
    ///
    /// Output order is draw order. Instance IDs come from the catalog's
    /// counter and are never reused, including across calls.
    pub fn draw_selection(
        &mut self,
        count: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<TokenInstance>, CatalogError> {
        let mut selection = Vec::with_capacity(count);
        let mut drawn_per_id: HashMap<String, u32> = HashMap::new();
        let mut attempts = 0u32;

        while selection.len() < count {
            attempts += 1;
            if attempts > MAX_DRAW_ATTEMPTS {
                warn!(
                    "Sampler gave up after {} attempts ({} of {} drawn)",
                    attempts,
                    selection.len(),
                    count
                );
                return Err(CatalogError::SamplerExhausted {
                    requested: count,
                    drawn: selection.len(),
                });
            }

            let rarity = self.weighted_rarity(rng);
            let tier = match self.by_rarity.get(&rarity) {
                Some(tier) if !tier.is_empty() => tier,
                _ => continue,
            };

            let definition = &tier[rng.gen_range(0..tier.len())];
            let drawn = drawn_per_id.entry(definition.id.clone()).or_insert(0);
            if *drawn >= self.config.max_per_id {
                continue;
            }
            *drawn += 1;

            let token_id = definition.id.clone();
            let instance_id = self.next_instance_id.to_string();
            self.next_instance_id += 1;
            selection.push(TokenInstance::new(&token_id, &instance_id));
        }

        Ok(selection)
    }
}

/// The shipped token set. IDs avoid underscores so the
/// `token_id_instance_id` display form stays parseable.
pub fn standard_definitions() -> Vec<TokenDefinition> {
    vec![
        TokenDefinition::new("acorn", TokenRarity::Common),
        TokenDefinition::new("pebble", TokenRarity::Common),
        TokenDefinition::new("twig", TokenRarity::Common),
        TokenDefinition::new("moss", TokenRarity::Common),
        TokenDefinition::new("thistle", TokenRarity::Common),
        TokenDefinition::new("fern", TokenRarity::Common),
        TokenDefinition::new("foxglove", TokenRarity::Rare),
        TokenDefinition::new("morel", TokenRarity::Rare),
        TokenDefinition::new("bramble", TokenRarity::Rare),
        TokenDefinition::new("hollyberry", TokenRarity::Rare),
        TokenDefinition::new("wyrmscale", TokenRarity::Epic),
        TokenDefinition::new("sunshard", TokenRarity::Epic),
        TokenDefinition::new("moonwell", TokenRarity::Epic),
        TokenDefinition::new("heartwood", TokenRarity::Legendary),
        TokenDefinition::new("stormcrown", TokenRarity::Legendary),
    ]
}
