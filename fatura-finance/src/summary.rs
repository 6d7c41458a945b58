//! Spending summary: rows per category and what is still unclassified.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use fatura_ingest::{SourceProfile, read_statement};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total: f64,
}

/// Statistics over rows left in the fallback category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub fallback_label: String,
    /// Most frequent first.
    pub categories: Vec<CategoryTotal>,
    pub fallback: Option<FallbackStats>,
}

impl Summary {
    pub fn from_rows<'a, I>(rows: I, fallback: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut groups: HashMap<&str, (usize, f64)> = HashMap::new();
        let mut unclassified: Vec<f64> = Vec::new();

        for (category, amount) in rows {
            let g = groups.entry(category).or_insert((0, 0.0));
            g.0 += 1;
            g.1 += amount;
            if category == fallback {
                unclassified.push(amount);
            }
        }

        let mut categories: Vec<CategoryTotal> = groups
            .into_iter()
            .map(|(category, (count, total))| CategoryTotal {
                category: category.to_string(),
                count,
                total,
            })
            .collect();
        categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

        let fallback_stats = if unclassified.is_empty() {
            None
        } else {
            let sum: f64 = unclassified.iter().sum();
            Some(FallbackStats {
                count: unclassified.len(),
                sum,
                mean: sum / unclassified.len() as f64,
                max: unclassified.iter().copied().fold(f64::MIN, f64::max),
                min: unclassified.iter().copied().fold(f64::MAX, f64::min),
            })
        };

        Self {
            fallback_label: fallback.to_string(),
            categories,
            fallback: fallback_stats,
        }
    }

    pub fn row_count(&self) -> usize {
        self.categories.iter().map(|c| c.count).sum()
    }

    pub fn render(&self) -> String {
        let mut s = String::new();
        for c in &self.categories {
            let _ = writeln!(s, "  {:<24} {:>5} rows  {:>12.2}", c.category, c.count, c.total);
        }
        match &self.fallback {
            Some(f) => {
                let _ = writeln!(
                    s,
                    "  still in '{}': {} rows, sum {:.2}, mean {:.2}, max {:.2}, min {:.2}",
                    self.fallback_label, f.count, f.sum, f.mean, f.max, f.min
                );
            }
            None => {
                let _ = writeln!(s, "  nothing left in '{}'", self.fallback_label);
            }
        }
        s
    }
}

/// Summarize an already classified file by reading its category column.
pub fn summarize_file(
    path: impl AsRef<Path>,
    profile: &SourceProfile,
    column: &str,
    fallback: &str,
) -> Result<Summary> {
    let path = path.as_ref();
    let profile = profile.clone().with_category(column);
    let statement =
        read_statement(path, &profile).with_context(|| format!("reading {}", path.display()))?;

    Ok(Summary::from_rows(
        statement.rows.iter().map(|r| {
            (
                r.transaction.raw_category.as_deref().unwrap_or(fallback),
                r.transaction.amount,
            )
        }),
        fallback,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_and_sorts_by_count() {
        let rows = [
            ("mercado", 10.0),
            ("transporte", 5.0),
            ("mercado", 20.0),
            ("outros", 7.5),
            ("outros", 2.5),
            ("mercado", 1.0),
        ];
        let s = Summary::from_rows(rows.iter().map(|(c, a)| (*c, *a)), "outros");

        assert_eq!(s.row_count(), 6);
        assert_eq!(s.categories[0], CategoryTotal { category: "mercado".into(), count: 3, total: 31.0 });
        assert_eq!(s.categories[1].category, "outros");
        assert_eq!(s.categories[2].category, "transporte");

        let f = s.fallback.unwrap();
        assert_eq!(f.count, 2);
        assert_eq!(f.sum, 10.0);
        assert_eq!(f.mean, 5.0);
        assert_eq!(f.max, 7.5);
        assert_eq!(f.min, 2.5);
    }

    #[test]
    fn test_no_fallback_rows() {
        let s = Summary::from_rows([("mercado", 1.0)], "outros");
        assert!(s.fallback.is_none());
        assert!(s.render().contains("nothing left in 'outros'"));
    }

    #[test]
    fn test_summarize_classified_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_classificado.csv");
        std::fs::write(
            &path,
            "date,title,amount,categoria\n\
             2025-04-12,Uber,23.90,transporte\n\
             2025-04-13,Loja,5.00,outros\n\
             2025-04-14,99,10.10,transporte\n",
        )
        .unwrap();

        let s = summarize_file(&path, &SourceProfile::nubank(), "categoria", "outros").unwrap();
        assert_eq!(s.categories[0].category, "transporte");
        assert_eq!(s.categories[0].count, 2);
        assert_eq!(s.fallback.as_ref().map(|f| f.count), Some(1));
    }
}
