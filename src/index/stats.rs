use crate::index::types::IndexMeta;
use std::io::{self, Write};
use std::path::Path;

/// Print index statistics
pub fn write_stats<W: Write>(out: &mut W, data_dir: &Path, meta: &IndexMeta) -> io::Result<()> {
    writeln!(out, "Index Statistics")?;
    writeln!(out, "================")?;
    writeln!(out)?;
    writeln!(out, "Index location:   {}", data_dir.display())?;
    writeln!(out, "Index version:    {}", meta.version)?;
    writeln!(out, "Trie kind:        {:?}", meta.kind)?;
    writeln!(out, "Merged batches:   {}", meta.merges)?;
    writeln!(out)?;
    writeln!(out, "Nodes:            {}", meta.node_count)?;
    writeln!(out, "Edges:            {} ({} blocks)", meta.edge_count, meta.edge_block_count)?;
    writeln!(
        out,
        "Positions:        {} ({} blocks)",
        meta.position_count, meta.pos_block_count
    )?;
    writeln!(out, "Buffer labels:    {}", meta.buffer_len)?;
    writeln!(out, "Distinct labels:  {}", meta.label_count)?;
    writeln!(out, "Files:            {}", meta.file_count)?;
    writeln!(out, "Projects:         {}", meta.project_count)?;
    writeln!(out, "Adjacent pairs:   {}", meta.next_stmt_count)?;

    if meta.edge_count > 0 {
        writeln!(
            out,
            "Labels per edge:  {:.2}",
            meta.buffer_len as f64 / meta.edge_count as f64
        )?;
    }

    if let Ok(size) = dir_size(data_dir) {
        writeln!(out)?;
        writeln!(out, "Index size:       {}", format_size(size))?;
    }

    writeln!(out)?;
    writeln!(out, "Created:          {}", format_timestamp(meta.created_at))?;
    writeln!(out, "Updated:          {}", format_timestamp(meta.updated_at))?;
    Ok(())
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> io::Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                size += entry.metadata()?.len();
            } else if path.is_dir() {
                size += dir_size(&path)?;
            }
        }
    }
    Ok(size)
}

/// Format byte size to human readable
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    format!("{:?}", UNIX_EPOCH + Duration::from_secs(ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_write_stats_reports_counters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("nodes.bin"), vec![0u8; 100]).unwrap();
        let meta = IndexMeta {
            node_count: 12,
            edge_count: 4,
            buffer_len: 10,
            ..Default::default()
        };

        let mut out = Vec::new();
        write_stats(&mut out, dir.path(), &meta).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Nodes:            12"));
        assert!(text.contains("Labels per edge:  2.50"));
        assert!(text.contains("Index size:       100 bytes"));
    }
}
