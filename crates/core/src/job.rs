//! 任务模型与输入枚举
//!
//! 批处理开始前冻结任务清单：遍历输入根目录（可选递归），只收
//! 扩展名为 `.pdf`（不区分大小写）的文件，输出路径在输出根目录下
//! 镜像输入的相对路径。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 一份输入文档到一份输出文档的工作单元
#[derive(Debug, Clone)]
pub struct Job {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

/// 任务的终态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(String),
}

/// 每个任务恰好上报一次的结果
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// 枚举输入根目录下的全部 PDF，生成冻结的任务清单
pub fn discover_jobs(
    input_root: &Path,
    output_root: &Path,
    include_subfolders: bool,
) -> io::Result<Vec<Job>> {
    let mut jobs = Vec::new();
    collect(input_root, input_root, output_root, include_subfolders, &mut jobs)?;
    // 遍历顺序与文件系统相关，排序让清单可复现
    jobs.sort_by(|a, b| a.input_path.cmp(&b.input_path));
    Ok(jobs)
}

fn collect(
    dir: &Path,
    input_root: &Path,
    output_root: &Path,
    recurse: bool,
    jobs: &mut Vec<Job>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if recurse {
                collect(&path, input_root, output_root, recurse, jobs)?;
            }
            continue;
        }
        if !is_pdf(&path) {
            continue;
        }
        let relative = path
            .strip_prefix(input_root)
            .unwrap_or(path.as_path())
            .to_path_buf();
        jobs.push(Job {
            output_path: output_root.join(&relative),
            input_path: path,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn test_discovers_only_pdfs_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.pdf"));
        touch(&dir.path().join("b.PDF"));
        touch(&dir.path().join("c.txt"));
        touch(&dir.path().join("d.pdf.bak"));

        let jobs = discover_jobs(dir.path(), out.path(), false).unwrap();
        let names: Vec<_> = jobs
            .iter()
            .map(|j| j.input_path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.pdf", "b.PDF"]);
    }

    #[test]
    fn test_subfolder_recursion_flag() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(&dir.path().join("top.pdf"));
        touch(&dir.path().join("sub/inner.pdf"));

        let flat = discover_jobs(dir.path(), out.path(), false).unwrap();
        assert_eq!(flat.len(), 1);

        let recursive = discover_jobs(dir.path(), out.path(), true).unwrap();
        assert_eq!(recursive.len(), 2);
    }

    #[test]
    fn test_output_mirrors_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub/deep/plan.pdf"));

        let jobs = discover_jobs(dir.path(), out.path(), true).unwrap();
        assert_eq!(
            jobs[0].output_path,
            out.path().join("sub").join("deep").join("plan.pdf")
        );
    }
}
