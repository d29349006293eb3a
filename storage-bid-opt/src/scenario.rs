//! Flat indexing of the day-ahead and within-day scenario stages.
//!
//! A day-ahead scenario `(i, j)` combines price scenario `i` with demand
//! scenario `j` and is stored at `a = D * i + j`. A within-day scenario
//! `(i, j, k, l)` further picks within-day price `k` and within-day demand
//! realization `l` and is stored at `b = R * (Q * a + k) + l`.

/// Coordinates of a day-ahead scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayAheadScenario {
    pub price: usize,
    pub demand: usize,
}

/// Coordinates of a within-day scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WithinDayScenario {
    pub price: usize,
    pub demand: usize,
    pub within_day_price: usize,
    pub within_day_demand: usize,
}

impl WithinDayScenario {
    pub fn day_ahead(&self) -> DayAheadScenario {
        DayAheadScenario {
            price: self.price,
            demand: self.demand,
        }
    }
}

/// Cardinalities of the scenario sets: `P` day-ahead prices, `D` day-ahead
/// demands, `Q` within-day prices, `R` within-day demand realizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioIndexMapper {
    prices: usize,
    demands: usize,
    within_day_prices: usize,
    within_day_demands: usize,
}

impl ScenarioIndexMapper {
    pub fn new(
        prices: usize,
        demands: usize,
        within_day_prices: usize,
        within_day_demands: usize,
    ) -> Self {
        Self {
            prices,
            demands,
            within_day_prices,
            within_day_demands,
        }
    }

    /// `scenarios_DA = P * D`
    pub fn day_ahead_count(&self) -> usize {
        self.prices * self.demands
    }

    /// `scenarios_WD = P * D * Q * R`
    pub fn within_day_count(&self) -> usize {
        self.day_ahead_count() * self.within_day_prices * self.within_day_demands
    }

    /// Number of within-day scenarios below one day-ahead scenario.
    pub fn branching(&self) -> usize {
        self.within_day_prices * self.within_day_demands
    }

    pub fn day_ahead_index(&self, scenario: DayAheadScenario) -> usize {
        debug_assert!(scenario.price < self.prices && scenario.demand < self.demands);
        self.demands * scenario.price + scenario.demand
    }

    pub fn within_day_index(&self, scenario: WithinDayScenario) -> usize {
        debug_assert!(
            scenario.within_day_price < self.within_day_prices
                && scenario.within_day_demand < self.within_day_demands
        );
        let a = self.day_ahead_index(scenario.day_ahead());
        self.within_day_demands * (self.within_day_prices * a + scenario.within_day_price)
            + scenario.within_day_demand
    }

    pub fn day_ahead_coordinates(&self, a: usize) -> Option<DayAheadScenario> {
        if a >= self.day_ahead_count() {
            return None;
        }
        Some(DayAheadScenario {
            price: a / self.demands,
            demand: a % self.demands,
        })
    }

    pub fn within_day_coordinates(&self, b: usize) -> Option<WithinDayScenario> {
        if b >= self.within_day_count() {
            return None;
        }
        let within_day_demand = b % self.within_day_demands;
        let rest = b / self.within_day_demands;
        let within_day_price = rest % self.within_day_prices;
        let day_ahead = self.day_ahead_coordinates(rest / self.within_day_prices)?;
        Some(WithinDayScenario {
            price: day_ahead.price,
            demand: day_ahead.demand,
            within_day_price,
            within_day_demand,
        })
    }

    /// Day-ahead scenarios in flat-index order.
    pub fn day_ahead_scenarios(&self) -> impl Iterator<Item = (usize, DayAheadScenario)> + '_ {
        (0..self.prices).flat_map(move |price| {
            (0..self.demands).map(move |demand| {
                let scenario = DayAheadScenario { price, demand };
                (self.day_ahead_index(scenario), scenario)
            })
        })
    }

    /// Within-day scenarios below day-ahead scenario `parent`, in flat-index order.
    pub fn within_day_children(
        &self,
        parent: DayAheadScenario,
    ) -> impl Iterator<Item = (usize, WithinDayScenario)> + '_ {
        (0..self.within_day_prices).flat_map(move |within_day_price| {
            (0..self.within_day_demands).map(move |within_day_demand| {
                let scenario = WithinDayScenario {
                    price: parent.price,
                    demand: parent.demand,
                    within_day_price,
                    within_day_demand,
                };
                (self.within_day_index(scenario), scenario)
            })
        })
    }
}
