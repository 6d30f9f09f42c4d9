use polars::prelude::*;

/// Canonicalizer for one symbol+granularity series of bars.
///
/// Frames carry a `start_ms` key column plus `open`, `high`, `low`, `close`,
/// `volume`.
pub struct Canonicalizer;

impl Canonicalizer {
    /// Sort by start time and drop duplicate start times, keeping the first
    /// occurrence in input order.
    pub fn canonicalize(df: LazyFrame) -> LazyFrame {
        df.sort(
            ["start_ms"],
            SortMultipleOptions::default()
                .with_order_descending(false)
                .with_maintain_order(true),
        )
        .unique_stable(Some(vec!["start_ms".into()]), UniqueKeepStrategy::First)
    }

    /// Keep only bars whose open and close lie inside `[low, high]` and whose
    /// volume is non-negative.
    pub fn validate(df: LazyFrame) -> LazyFrame {
        df.filter(
            col("high")
                .gt_eq(col("low"))
                .and(col("volume").gt_eq(lit(0.0)))
                .and(col("open").gt_eq(col("low")))
                .and(col("open").lt_eq(col("high")))
                .and(col("close").gt_eq(col("low")))
                .and(col("close").lt_eq(col("high"))),
        )
    }

    /// Number of rows whose start time repeats an earlier row.
    pub fn count_duplicates(df: &DataFrame) -> Result<usize, PolarsError> {
        let unique = df
            .clone()
            .lazy()
            .unique(Some(vec!["start_ms".into()]), UniqueKeepStrategy::First)
            .collect()?;
        Ok(df.height() - unique.height())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_sorts_data() {
        let df = df!(
            "start_ms" => &[3i64, 1, 2],
            "open" => &[100.0, 100.0, 100.0],
            "high" => &[105.0, 105.0, 105.0],
            "low" => &[99.0, 99.0, 99.0],
            "close" => &[103.0, 103.0, 103.0],
            "volume" => &[1000.0, 1000.0, 1000.0],
        )
        .unwrap();

        let sorted = Canonicalizer::canonicalize(df.lazy()).collect().unwrap();
        let starts = sorted.column("start_ms").unwrap().i64().unwrap();

        assert_eq!(starts.get(0), Some(1));
        assert_eq!(starts.get(1), Some(2));
        assert_eq!(starts.get(2), Some(3));
    }

    #[test]
    fn test_canonicalize_removes_duplicates_keeping_first() {
        let df = df!(
            "start_ms" => &[1i64, 1, 2],
            "open" => &[100.0, 101.0, 102.0],
            "high" => &[105.0, 106.0, 107.0],
            "low" => &[99.0, 99.0, 99.0],
            "close" => &[103.0, 104.0, 105.0],
            "volume" => &[1000.0, 2000.0, 3000.0],
        )
        .unwrap();

        let deduped = Canonicalizer::canonicalize(df.lazy()).collect().unwrap();

        assert_eq!(deduped.height(), 2);
        let opens = deduped.column("open").unwrap().f64().unwrap();
        assert_eq!(opens.get(0), Some(100.0));
    }

    #[test]
    fn test_validate_rejects_inverted_bars() {
        let df = df!(
            "start_ms" => &[1i64, 2],
            "open" => &[100.0, 100.0],
            "high" => &[95.0, 105.0],
            "low" => &[105.0, 99.0],
            "close" => &[102.0, 103.0],
            "volume" => &[1000.0, 1000.0],
        )
        .unwrap();

        let validated = Canonicalizer::validate(df.lazy()).collect().unwrap();

        assert_eq!(validated.height(), 1);
        let starts = validated.column("start_ms").unwrap().i64().unwrap();
        assert_eq!(starts.get(0), Some(2));
    }

    #[test]
    fn test_validate_rejects_close_outside_range() {
        let df = df!(
            "start_ms" => &[1i64, 2],
            "open" => &[100.0, 100.0],
            "high" => &[105.0, 105.0],
            "low" => &[99.0, 99.0],
            "close" => &[110.0, 103.0],
            "volume" => &[1000.0, 1000.0],
        )
        .unwrap();

        let validated = Canonicalizer::validate(df.lazy()).collect().unwrap();
        assert_eq!(validated.height(), 1);
    }

    #[test]
    fn test_count_duplicates() {
        let df = df!(
            "start_ms" => &[1i64, 1, 2, 2, 2, 3],
            "open" => &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            "high" => &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            "low" => &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            "close" => &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            "volume" => &[1u64, 1, 1, 1, 1, 1],
        )
        .unwrap();
        assert_eq!(Canonicalizer::count_duplicates(&df).unwrap(), 3);
    }
}
