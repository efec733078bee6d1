//! Line-based file sharding shared by `sort_map` and `hashcat_crack`.

use std::path::{Path, PathBuf};

/// Splits `lines` into chunks of `lines_per_chunk = total/num_chunks + 1`,
/// writing each chunk to `{output_dir}/chunk_{i}.txt` and returning the
/// written paths in order. Ports `sort_map.py::_shard` /
/// `hashcat.py::_shard_wordlist` (identical arithmetic, same boundary rule).
pub async fn shard_lines(
    lines: &[Vec<u8>],
    output_dir: &Path,
    num_chunks: usize,
) -> std::io::Result<Vec<PathBuf>> {
    let total = lines.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let lines_per_chunk = total / num_chunks.max(1) + 1;

    let mut chunk_paths = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + lines_per_chunk).min(total);
        let chunk_path = output_dir.join(format!("chunk_{}.txt", chunk_paths.len()));
        let mut contents = Vec::new();
        for line in &lines[start..end] {
            contents.extend_from_slice(line);
        }
        tokio::fs::write(&chunk_path, contents).await?;
        chunk_paths.push(chunk_path);
        start = end;
    }
    Ok(chunk_paths)
}

/// Splits raw bytes into lines, each retaining its trailing `\n` (or lacking
/// one only for a final unterminated line) — needed so reduce's merge
/// compares identical byte sequences to what `sort_map` wrote.
pub fn split_keep_newlines(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            lines.push(bytes[start..=i].to_vec());
            start = i + 1;
        }
    }
    if start < bytes.len() {
        lines.push(bytes[start..].to_vec());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shards_six_lines_into_two_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let lines: Vec<Vec<u8>> =
            ["zebra", "apple", "orange", "banana", "kiwi", "grape"]
                .iter()
                .map(|s| format!("{s}\n").into_bytes())
                .collect();

        let chunks = shard_lines(&lines, dir.path(), 2).await.unwrap();
        assert_eq!(chunks.len(), 2);

        let c0 = tokio::fs::read_to_string(&chunks[0]).await.unwrap();
        let c1 = tokio::fs::read_to_string(&chunks[1]).await.unwrap();
        assert_eq!(c0, "zebra\napple\norange\nbanana\n");
        assert_eq!(c1, "kiwi\ngrape\n");
    }

    #[test]
    fn split_keep_newlines_preserves_terminators() {
        let lines = split_keep_newlines(b"a\nb\nc");
        assert_eq!(lines, vec![b"a\n".to_vec(), b"b\n".to_vec(), b"c".to_vec()]);
    }
}
