use std::collections::HashMap;

use lazy_static::lazy_static;
use thiserror::Error;

use crate::config::Metering;
use crate::media::Operation;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("the cost of {operation} with \"{model}\" must be positive")]
    ZeroCost { operation: Operation, model: String },
    #[error("the default cost of {0} must be positive")]
    ZeroDefaultCost(Operation),
}

/// Conservative cost of an operation with a model missing from the table.
pub const fn default_cost(operation: Operation) -> u64 {
    match operation {
        Operation::Image => 10,
        Operation::Edit => 10,
        Operation::Video => 100,
    }
}

lazy_static! {
    static ref BUILTIN_COSTS: Vec<(Operation, &'static str, u64)> = vec![
        (Operation::Image, "dall-e-3", 4),
        (Operation::Image, "dall-e-2", 2),
        (Operation::Image, "gpt-image-1", 5),
        (Operation::Image, "stable-image-core", 3),
        (Operation::Image, "stable-image-ultra", 8),
        (Operation::Image, "sd3.5-large", 6),
        (Operation::Image, "sd3.5-large-turbo", 4),
        (Operation::Image, "sd3.5-medium", 3),
        (Operation::Image, "black-forest-labs/flux-schnell", 1),
        (Operation::Image, "black-forest-labs/flux-1.1-pro", 4),
        (Operation::Image, "black-forest-labs/FLUX.1-schnell", 2),
        (Operation::Image, "black-forest-labs/FLUX.1-dev", 2),
        (Operation::Image, "stabilityai/stable-diffusion-xl-base-1.0", 2),
        (Operation::Image, "flux", 1),
        (Operation::Image, "turbo", 1),
        (Operation::Video, "minimax/video-01", 50),
        (Operation::Video, "luma/ray", 60),
        (Operation::Edit, "black-forest-labs/flux-kontext-pro", 5),
        (Operation::Edit, "black-forest-labs/flux-kontext-max", 8),
    ];
}

/// Credits charged per (operation, model). Lookups never fail: pairs missing
/// from the table cost the operation's default.
#[derive(Debug, Clone)]
pub struct CostTable {
    costs: HashMap<(Operation, String), u64>,
    defaults: HashMap<Operation, u64>,
}

impl CostTable {
    pub fn builtin() -> CostTable {
        let costs = BUILTIN_COSTS
            .iter()
            .map(|(op, model, cost)| ((*op, model.to_string()), *cost))
            .collect();

        CostTable {
            costs,
            defaults: HashMap::new(),
        }
    }

    /// The built-in table with the configured overrides applied.
    pub fn from_config(config: &Metering) -> Result<CostTable, Error> {
        let mut table = CostTable::builtin();

        for (operation, cost) in config.default_costs.to_map() {
            table.set_default(operation, cost)?;
        }

        for entry in &config.costs {
            table.set(entry.operation, &entry.model, entry.cost)?;
        }

        Ok(table)
    }

    pub fn set(&mut self, operation: Operation, model: &str, cost: u64) -> Result<(), Error> {
        if cost == 0 {
            return Err(Error::ZeroCost {
                operation,
                model: model.to_string(),
            });
        }

        self.costs.insert((operation, model.to_string()), cost);

        Ok(())
    }

    pub fn set_default(&mut self, operation: Operation, cost: u64) -> Result<(), Error> {
        if cost == 0 {
            return Err(Error::ZeroDefaultCost(operation));
        }

        self.defaults.insert(operation, cost);

        Ok(())
    }

    pub fn default_cost(&self, operation: Operation) -> u64 {
        self.defaults
            .get(&operation)
            .copied()
            .unwrap_or_else(|| default_cost(operation))
    }

    pub fn cost(&self, operation: Operation, model: &str) -> u64 {
        self.costs
            .get(&(operation, model.to_string()))
            .copied()
            .unwrap_or_else(|| self.default_cost(operation))
    }
}

impl Default for CostTable {
    fn default() -> Self {
        CostTable::builtin()
    }
}
