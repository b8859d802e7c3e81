/// A filter's (or the chain's) decision about a message.
///
/// Precedence is strict: `Amnesty` > `Block` > `Revoke` > `Pass`, where "greater" means "wins
/// when combined with any other verdict". `Amnesty` accepts a message unconditionally regardless
/// of what any other filter says; `Block` rejects pre-acceptance; `Revoke` asks that an
/// already-accepted message be hidden after the fact; `Pass` abstains.
///
/// The variants are declared in ascending precedence order so that `Ord`/`PartialOrd` (derived)
/// agree with the domain's "dominates" relation: the maximum of any non-empty set of verdicts is
/// the one that wins.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
  Pass,
  Revoke,
  Block,
  Amnesty,
}

impl Verdict {
  /// Whether this verdict stops further evaluation once seen (see [`crate::chain::Chain`]).
  pub fn short_circuits(self) -> bool {
    matches!(self, Verdict::Amnesty | Verdict::Block)
  }

  /// Whether this verdict should feed `is_spam = true` into training.
  pub fn trains_as_spam(self) -> bool {
    matches!(self, Verdict::Revoke | Verdict::Block)
  }
}
