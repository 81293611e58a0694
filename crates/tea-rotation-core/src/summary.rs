//! Order breakdown for a session summary.
//!
//! Built from every order in the session, excused ones included, so whoever
//! makes the tea sees the full list.

use serde::Serialize;

use crate::OrderWithUser;

/// Count of one sugar level for a drink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SugarCount {
    /// Sugar level as ordered.
    pub sugar_level: String,
    /// Number of cups.
    pub count: usize,
}

/// All cups of one drink type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrinkTally {
    /// Drink type, trimmed.
    pub drink_type: String,
    /// Per sugar level, in first-seen order.
    pub sugar_levels: Vec<SugarCount>,
}

/// Who ordered a given drink and sugar combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrinkRecipients {
    /// `"<drink> (<sugar>)"`.
    pub label: String,
    /// Display names in order of submission.
    pub names: Vec<String>,
}

/// Grouped view of a session's orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderBreakdown {
    /// Counts per drink and sugar level.
    pub by_drink: Vec<DrinkTally>,
    /// Names per drink and sugar combination.
    pub recipients: Vec<DrinkRecipients>,
}

impl OrderBreakdown {
    /// Group orders, preserving first-seen order at every level.
    #[must_use]
    pub fn from_orders(orders: &[OrderWithUser]) -> Self {
        let mut breakdown = Self::default();

        for entry in orders {
            let drink = entry.order.drink_type.trim();
            let sugar = entry.order.sugar_level.as_str();

            let tally = match breakdown.by_drink.iter().position(|t| t.drink_type == drink) {
                Some(idx) => &mut breakdown.by_drink[idx],
                None => {
                    breakdown.by_drink.push(DrinkTally {
                        drink_type: drink.to_string(),
                        sugar_levels: Vec::new(),
                    });
                    let last = breakdown.by_drink.len() - 1;
                    &mut breakdown.by_drink[last]
                }
            };
            match tally.sugar_levels.iter_mut().find(|s| s.sugar_level == sugar) {
                Some(level) => level.count += 1,
                None => tally.sugar_levels.push(SugarCount {
                    sugar_level: sugar.to_string(),
                    count: 1,
                }),
            }

            let label = format!("{drink} ({sugar})");
            match breakdown.recipients.iter_mut().find(|r| r.label == label) {
                Some(group) => group.names.push(entry.user_name.clone()),
                None => breakdown.recipients.push(DrinkRecipients {
                    label,
                    names: vec![entry.user_name.clone()],
                }),
            }
        }

        breakdown
    }

    /// Total cups across all drinks.
    #[must_use]
    pub fn total_cups(&self) -> usize {
        self.by_drink
            .iter()
            .flat_map(|t| t.sugar_levels.iter())
            .map(|s| s.count)
            .sum()
    }

    /// A readable instruction for whoever makes the tea.
    ///
    /// `Please make 2 Teas with normal sugar and 1 Coffee with less sugar.`
    #[must_use]
    pub fn instructions(&self) -> String {
        let mut items: Vec<String> = self
            .by_drink
            .iter()
            .flat_map(|tally| {
                tally.sugar_levels.iter().map(move |level| {
                    let drink = if level.count == 1 {
                        tally.drink_type.clone()
                    } else {
                        format!("{}s", tally.drink_type)
                    };
                    format!("{} {drink} {}", level.count, sugar_phrase(&level.sugar_level))
                })
            })
            .collect();

        match items.len() {
            0 => "No orders to make.".to_string(),
            1 => format!("Please make {}.", items[0]),
            2 => format!("Please make {} and {}.", items[0], items[1]),
            _ => {
                let last = items.pop().unwrap_or_default();
                format!("Please make {}, and {last}.", items.join(", "))
            }
        }
    }
}

fn sugar_phrase(level: &str) -> &'static str {
    match level {
        "No Sugar" => "with no sugar",
        "Less" => "with less sugar",
        _ => "with normal sugar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Order, SessionId, UserId};

    fn entry(name: &str, drink: &str, sugar: &str, excused: bool) -> OrderWithUser {
        OrderWithUser {
            order: Order::new(SessionId::generate(), UserId::generate(), drink, sugar, excused),
            user_name: name.to_string(),
        }
    }

    #[test]
    fn empty_session_has_nothing_to_make() {
        let breakdown = OrderBreakdown::from_orders(&[]);
        assert_eq!(breakdown.instructions(), "No orders to make.");
        assert_eq!(breakdown.total_cups(), 0);
    }

    #[test]
    fn groups_by_trimmed_drink_and_sugar() {
        let breakdown = OrderBreakdown::from_orders(&[
            entry("Alice", "Tea ", "Normal", false),
            entry("Bob", "Tea", "Normal", false),
            entry("Carol", "Tea", "Less", true),
        ]);

        assert_eq!(breakdown.by_drink.len(), 1);
        assert_eq!(
            breakdown.by_drink[0].sugar_levels,
            vec![
                SugarCount { sugar_level: "Normal".into(), count: 2 },
                SugarCount { sugar_level: "Less".into(), count: 1 },
            ]
        );
        assert_eq!(breakdown.recipients[0].label, "Tea (Normal)");
        assert_eq!(breakdown.recipients[0].names, ["Alice", "Bob"]);
        assert_eq!(breakdown.recipients[1].names, ["Carol"]);
        assert_eq!(breakdown.total_cups(), 3);
    }

    #[test]
    fn instructions_pluralize_and_join() {
        let two = OrderBreakdown::from_orders(&[
            entry("Alice", "Tea", "Normal", false),
            entry("Bob", "Tea", "Normal", false),
            entry("Carol", "Coffee", "Less", false),
        ]);
        assert_eq!(
            two.instructions(),
            "Please make 2 Teas with normal sugar and 1 Coffee with less sugar."
        );

        let three = OrderBreakdown::from_orders(&[
            entry("Alice", "Tea", "Normal", false),
            entry("Bob", "Coffee", "No Sugar", false),
            entry("Carol", "Green Tea", "Honey", false),
        ]);
        assert_eq!(
            three.instructions(),
            "Please make 1 Tea with normal sugar, 1 Coffee with no sugar, and 1 Green Tea with normal sugar."
        );
    }
}
