//! The structured signal produced by a parser and consumed by the lifecycle engine.

use rust_decimal::Decimal;

use crate::domain::rounding::order_of_magnitude;
use crate::error::DomainError;

const MAX_TARGETS: usize = 5;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    #[must_use]
    pub const fn is_long(self) -> bool {
        matches!(self, Self::Long)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

/// A parsed, validated trade signal. Construction always goes through
/// [`Signal::try_new`], so every `Signal` in circulation satisfies the
/// entry/target/stop-loss ordering invariant for its side.
#[derive(Debug, Clone)]
pub struct Signal {
    pub coin: String,
    pub side: Side,
    entries: Vec<Decimal>,
    targets: Vec<Decimal>,
    pub sl: Option<Decimal>,
    pub leverage: u32,
    /// Portion of balance to commit. Zero until [`Signal::with_risk_bounds`]
    /// resolves it against the engine's configured risk settings.
    pub fraction: Decimal,
    pub risk: Option<Decimal>,
    pub force_limit_order: bool,
    pub tag: String,
}

impl Signal {
    /// Construct and validate a signal. `entries` must have 1-2 levels, in
    /// either order - `try_new` resolves which is the side-appropriate near
    /// entry itself; `targets` must have at least one level ordered in trade
    /// direction.
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        coin: impl Into<String>,
        side: Side,
        entries: Vec<Decimal>,
        targets: Vec<Decimal>,
        sl: Option<Decimal>,
        leverage: u32,
        risk: Option<Decimal>,
        force_limit_order: bool,
        tag: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if entries.is_empty() {
            return Err(DomainError::NoEntries);
        }
        if targets.is_empty() {
            return Err(DomainError::NoTargets);
        }

        // Entries are quoted in whichever order the channel happens to type
        // them; sort into trade direction so index 0 is always the near
        // entry and the last is always `max_entry`, same as `targets`.
        let mut entries = entries;
        sort_in_direction(&mut entries, side);

        let mut targets = targets;
        targets.truncate(MAX_TARGETS);
        sort_in_direction(&mut targets, side);

        let entry = entries[0];
        let max_entry = *entries.last().unwrap_or(&entry);
        if !targets_monotone(&targets, side, max_entry) {
            return Err(DomainError::TargetsNotMonotone);
        }

        if let Some(sl) = sl {
            let valid = match side {
                Side::Long => sl < entry,
                Side::Short => sl > entry,
            };
            if !valid {
                return Err(DomainError::InvalidStopLoss {
                    sl,
                    entry,
                    side: side.as_str(),
                });
            }
        }

        Ok(Self {
            coin: coin.into().to_uppercase(),
            side,
            entries,
            targets,
            sl,
            leverage,
            fraction: Decimal::ZERO,
            risk,
            force_limit_order,
            tag: tag.into(),
        })
    }

    /// Nearer entry level - the one placement actually trades against.
    #[must_use]
    pub fn entry(&self) -> Decimal {
        self.entries[0]
    }

    /// Far boundary of the acceptable entry band. Equal to `entry()` when
    /// only a single entry level was given.
    #[must_use]
    pub fn max_entry(&self) -> Decimal {
        *self.entries.last().unwrap_or(&self.entries[0])
    }

    /// Resolve `fraction` against the engine's configured risk bounds: the
    /// per-signal `risk` factor if present (scaled and capped at
    /// `max_fraction`), else `default_fraction`. Must be called before
    /// `fraction` is read for sizing; a freshly parsed `Signal` carries no
    /// opinion of its own about account risk.
    #[must_use]
    pub fn with_risk_bounds(mut self, default_fraction: Decimal, max_fraction: Decimal) -> Self {
        self.fraction = self
            .risk
            .map(|r| (r / Decimal::from(10)).min(max_fraction))
            .unwrap_or(default_fraction);
        self
    }

    #[must_use]
    pub fn targets(&self) -> &[Decimal] {
        &self.targets
    }

    #[must_use]
    pub fn is_wait_entry(&self) -> bool {
        self.entries.len() > 1 || self.force_limit_order
    }

    /// Reward (distance of the last target from entry) over risk (distance
    /// of the stop from entry). `None` when there's no stop to divide by.
    #[must_use]
    pub fn risk_reward(&self) -> Option<Decimal> {
        let sl = self.sl?;
        let entry = self.entry();
        let last_target = *self.targets.last()?;
        let risk_dist = (entry - sl).abs();
        if risk_dist.is_zero() {
            return None;
        }
        Some((last_target - entry).abs() / risk_dist)
    }

    /// Rescale entries/targets/sl by whatever power of ten brings the near
    /// entry within one order of magnitude of `live_price`. Channels quote
    /// the same coin in wildly different unit conventions (e.g. an index
    /// price of `28390` for a coin actually trading at `0.02839`), and this
    /// is the normalization step that reconciles the two.
    #[must_use]
    pub fn autocorrect(mut self, live_price: Decimal) -> Self {
        if live_price <= Decimal::ZERO || self.entry() <= Decimal::ZERO {
            return self;
        }

        let exponent = order_of_magnitude(self.entry()) - order_of_magnitude(live_price);
        if exponent == 0 {
            return self;
        }

        let factor = if exponent > 0 {
            Decimal::ONE / pow10(exponent)
        } else {
            pow10(-exponent)
        };

        for e in &mut self.entries {
            *e *= factor;
        }
        for t in &mut self.targets {
            *t *= factor;
        }
        if let Some(sl) = &mut self.sl {
            *sl *= factor;
        }

        sort_in_direction(&mut self.targets, self.side);
        self
    }
}

fn pow10(exp: i32) -> Decimal {
    let mut result = Decimal::ONE;
    let ten = Decimal::from(10);
    for _ in 0..exp {
        result *= ten;
    }
    result
}

fn sort_in_direction(values: &mut [Decimal], side: Side) {
    match side {
        Side::Long => values.sort(),
        Side::Short => values.sort_by(|a, b| b.cmp(a)),
    }
}

fn targets_monotone(targets: &[Decimal], side: Side, entry: Decimal) -> bool {
    let mut prev = entry;
    for &t in targets {
        let ok = match side {
            Side::Long => t > prev,
            Side::Short => t < prev,
        };
        if !ok {
            return false;
        }
        prev = t;
    }
    true
}
