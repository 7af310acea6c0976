//! Levenshtein edit distance over Unicode scalar values.

/// Minimum number of single-character insertions, deletions and substitutions
/// needed to turn `a` into `b`.
///
/// Classic dynamic programming over a full `(|a|+1) x (|b|+1)` table. Catalog
/// names and typed queries are short, so the table stays small.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());

    let mut table = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        table[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            table[i][j] = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + cost);
        }
    }

    table[m][n]
}
