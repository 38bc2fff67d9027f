use std::sync::Arc;

use cb_compiler::{convert, CancellationToken, ConversionResult, ConvertOptions, ErrorCounter};
use log::debug;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy)]
pub struct LaneConfig {
    /// Lines per chunk; every chunk becomes one ruleset.
    pub chunk_size: usize,
    /// Parallel conversion lanes.
    pub lanes: usize,
}

/// Convert `lines` in fixed-size chunks spread over blocking lanes.
///
/// Lane `k` handles chunks `k`, `k + lanes`, ...; results come back ordered
/// by chunk index. Errors from every lane land in `counter`.
pub async fn convert_chunks(
    lines: Arc<Vec<String>>,
    config: LaneConfig,
    options: ConvertOptions,
    cancel: Arc<CancellationToken>,
    counter: Arc<ErrorCounter>,
) -> Result<Vec<ConversionResult>, String> {
    let chunk_size = config.chunk_size.max(1);
    let chunk_count = lines.len().div_ceil(chunk_size);
    if chunk_count == 0 {
        return Ok(Vec::new());
    }
    let lanes = config.lanes.clamp(1, chunk_count);

    let mut set = JoinSet::new();
    for lane in 0..lanes {
        let lines = Arc::clone(&lines);
        let cancel = Arc::clone(&cancel);
        let counter = Arc::clone(&counter);

        set.spawn_blocking(move || {
            let mut converted = Vec::new();
            for index in (lane..chunk_count).step_by(lanes) {
                if cancel.is_cancelled() {
                    break;
                }
                let start = index * chunk_size;
                let end = (start + chunk_size).min(lines.len());
                let result = convert(&lines[start..end], &options, Some(&cancel), Some(&counter));
                debug!(
                    "Lane {lane}: chunk {index} -> {} entries, {} errors",
                    result.entries_count, result.errors_count
                );
                converted.push((index, result));
            }
            converted
        });
    }

    let mut results: Vec<Option<ConversionResult>> = vec![None; chunk_count];
    while let Some(joined) = set.join_next().await {
        let converted = joined.map_err(|e| format!("Conversion lane failed: {}", e))?;
        for (index, result) in converted {
            results[index] = Some(result);
        }
    }

    if cancel.is_cancelled() {
        return Err("Conversion cancelled".to_string());
    }

    Ok(results
        .into_iter()
        .map(|result| result.unwrap_or_else(ConversionResult::empty))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_compiler::EMPTY_RESULT_JSON;
    use cb_core::HostVersion;

    fn lines(n: usize) -> Arc<Vec<String>> {
        Arc::new((0..n).map(|i| format!("||ads{i}.example^")).collect())
    }

    async fn run(lines: Arc<Vec<String>>, chunk_size: usize, lanes: usize) -> Vec<ConversionResult> {
        convert_chunks(
            lines,
            LaneConfig { chunk_size, lanes },
            ConvertOptions::new(HostVersion::V16_4),
            Arc::new(CancellationToken::new()),
            Arc::new(ErrorCounter::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn results_are_ordered_by_chunk() {
        let results = run(lines(10), 3, 2).await;
        let sizes: Vec<usize> = results.iter().map(|r| r.source_lines_count).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert!(results[0].json.contains("ads0"));
        assert!(results[3].json.contains("ads9"));
    }

    #[tokio::test]
    async fn lane_count_does_not_change_output() {
        let single: Vec<String> = run(lines(20), 4, 1).await.into_iter().map(|r| r.json).collect();
        let many: Vec<String> = run(lines(20), 4, 8).await.into_iter().map(|r| r.json).collect();
        assert_eq!(single, many);
    }

    #[tokio::test]
    async fn empty_input_has_no_chunks() {
        assert!(run(Arc::new(Vec::new()), 10, 4).await.is_empty());
    }

    #[tokio::test]
    async fn shared_error_counter() {
        let counter = Arc::new(ErrorCounter::new());
        let input = Arc::new(vec![
            "||a.example^$bogus".to_string(),
            "||b.example^".to_string(),
            "||c.example^$bogus".to_string(),
        ]);
        let results = convert_chunks(
            input,
            LaneConfig { chunk_size: 1, lanes: 3 },
            ConvertOptions::new(HostVersion::V16_4),
            Arc::new(CancellationToken::new()),
            Arc::clone(&counter),
        )
        .await
        .unwrap();

        assert_eq!(counter.count(), 2);
        assert_eq!(results[0].json, EMPTY_RESULT_JSON);
        assert_eq!(results[1].entries_count, 1);
    }

    #[tokio::test]
    async fn cancelled_run_fails() {
        let cancel = Arc::new(CancellationToken::new());
        cancel.cancel();
        let result = convert_chunks(
            lines(5),
            LaneConfig { chunk_size: 2, lanes: 2 },
            ConvertOptions::new(HostVersion::V16_4),
            cancel,
            Arc::new(ErrorCounter::new()),
        )
        .await;
        assert!(result.is_err());
    }
}
