//! Batch scheduler: one JSON request on stdin, a two-stage worker pipeline
//! in the middle, one JSON response on stdout.
//!
//! Results are indexed: `results[i]` always answers `files[i]`, no matter
//! in which order the workers finish.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use decoder::internal::sniff;
use decoder::AudioMeta;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache;
use crate::ffmpeg::{self, UpdateMetadataParams};
use crate::options::{BatchOptions, ProcessOptions};
use crate::process_error::ProcessError;
use crate::processor::{read_full, Processor, HEADER_PROBE_SIZE};

const SMALL_FILE_THRESHOLD: u64 = 1024 * 1024; // 1 MiB
const LARGE_AVG_THRESHOLD: u64 = 50 * 1024 * 1024; // 50 MiB
const MAX_WORKERS: usize = 20;

/// Files below four go through a plain worker pool; from four on, the
/// decrypt/finalize pipeline pays off.
const PIPELINE_MIN_FILES: usize = 4;

#[derive(Deserialize)]
pub struct BatchRequest {
    pub files: Vec<FileTask>,
    #[serde(default)]
    pub options: BatchOptions,
}

#[derive(Clone, Deserialize)]
pub struct FileTask {
    pub input_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Clone, Serialize)]
pub struct ProcessResult {
    pub input_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub process_time_ms: u64,
}

#[derive(Serialize)]
pub struct BatchResponse {
    pub results: Vec<ProcessResult>,
    pub total_files: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub total_time_ms: u64,
}

/// Read one request from stdin, process it, write the response to stdout.
pub fn run_batch_mode(stop: Arc<AtomicBool>) -> anyhow::Result<()> {
    info!("starting batch mode");
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: BatchRequest = serde_json::from_str(&input)?;
    let options = request.options.clone().into_process_options();
    let response = process_batch(request.files, options, stop);
    serde_json::to_writer_pretty(std::io::stdout().lock(), &response)?;
    Ok(())
}

pub fn process_batch(
    files: Vec<FileTask>,
    options: ProcessOptions,
    stop: Arc<AtomicBool>,
) -> BatchResponse {
    let started = Instant::now();
    let total_files = files.len();

    // results answer by request position even for tasks never started
    let mut results: Vec<ProcessResult> = files
        .iter()
        .map(|task| ProcessResult {
            input_path: task.input_path.clone(),
            output_path: None,
            success: false,
            error: Some("not processed".to_string()),
            process_time_ms: 0,
        })
        .collect();

    let mut tasks: Vec<(usize, FileTask)> = files.into_iter().enumerate().collect();
    let avg_file_size = assign_priorities(&mut tasks);
    sort_by_priority(&mut tasks);

    let workers = calculate_optimal_workers(num_cpus::get(), total_files, avg_file_size);
    info!(
        files = total_files,
        workers,
        pipeline = total_files >= PIPELINE_MIN_FILES,
        "starting batch processing"
    );

    let collected = if total_files >= PIPELINE_MIN_FILES {
        run_pipeline(tasks, workers, &options, &stop)
    } else {
        run_simple(tasks, workers, &options, &stop)
    };

    let mut success_count = 0;
    for (index, result) in collected {
        results[index] = result;
    }
    for result in &results {
        if result.success {
            success_count += 1;
        }
    }

    let response = BatchResponse {
        failed_count: total_files - success_count,
        success_count,
        total_files,
        total_time_ms: started.elapsed().as_millis() as u64,
        results,
    };
    info!(
        success = response.success_count,
        failed = response.failed_count,
        elapsed_ms = response.total_time_ms,
        "batch processing finished"
    );
    response
}

/// Fill in missing sizes, assign small-file priority, return the average
/// size used for worker scaling.
fn assign_priorities(tasks: &mut [(usize, FileTask)]) -> u64 {
    let mut total = 0u64;
    let mut counted = 0u64;
    for (_, task) in tasks.iter_mut() {
        if task.file_size == 0 {
            if let Ok(stat) = std::fs::metadata(&task.input_path) {
                task.file_size = stat.len();
            }
        }
        if task.priority == 0 {
            task.priority = if task.file_size < SMALL_FILE_THRESHOLD { 1 } else { 2 };
        }
        if task.file_size > 0 {
            total += task.file_size;
            counted += 1;
        }
    }
    if counted > 0 {
        total / counted
    } else {
        0
    }
}

/// Small files first, ties broken by ascending size. The sort is stable,
/// so equal tasks keep request order.
fn sort_by_priority(tasks: &mut [(usize, FileTask)]) {
    tasks.sort_by(|(_, a), (_, b)| {
        a.priority
            .cmp(&b.priority)
            .then(a.file_size.cmp(&b.file_size))
    });
}

/// Worker count rule: base is the CPU count, scaled by batch size and
/// average file size, clamped to `[1, 20]`.
pub fn calculate_optimal_workers(cpu: usize, file_count: usize, avg_file_size: u64) -> usize {
    let mut workers = cpu as i64;
    if file_count >= 100 {
        workers = cpu as i64 * 3;
    } else if file_count >= 20 {
        workers = cpu as i64 * 2;
    } else if file_count <= 5 {
        workers = (cpu / 2) as i64;
    }
    if avg_file_size > LARGE_AVG_THRESHOLD {
        workers = (workers as f64 * 1.5) as i64;
    } else if avg_file_size < SMALL_FILE_THRESHOLD {
        workers = (workers as f64 * 0.8) as i64;
    }
    workers.clamp(1, MAX_WORKERS as i64) as usize
}

// single-stage mode

fn run_simple(
    tasks: Vec<(usize, FileTask)>,
    workers: usize,
    options: &ProcessOptions,
    stop: &Arc<AtomicBool>,
) -> Vec<(usize, ProcessResult)> {
    let (task_tx, task_rx) = unbounded::<(usize, FileTask)>();
    let (result_tx, result_rx) = unbounded::<(usize, ProcessResult)>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let options = options.clone();
            scope.spawn(move || {
                for (index, task) in task_rx.iter() {
                    let result = process_task(&task, &options);
                    let _ = result_tx.send((index, result));
                }
            });
        }
        drop(task_rx);
        drop(result_tx);

        for item in tasks {
            if stop.load(Ordering::Relaxed) {
                warn!("stop requested, no further tasks will be scheduled");
                break;
            }
            let _ = task_tx.send(item);
        }
        drop(task_tx);

        result_rx.iter().collect()
    })
}

fn process_task(task: &FileTask, options: &ProcessOptions) -> ProcessResult {
    let started = Instant::now();
    let mut result = ProcessResult {
        input_path: task.input_path.clone(),
        output_path: None,
        success: false,
        error: None,
        process_time_ms: 0,
    };

    let input = PathBuf::from(&task.input_path);
    if !input.exists() {
        result.error = Some(format!("input file does not exist: {}", task.input_path));
        result.process_time_ms = started.elapsed().as_millis() as u64;
        return result;
    }
    let processor = processor_for_task(task, options);
    match processor.process_file(&input) {
        Ok(Some(out)) => {
            result.success = true;
            result.output_path = Some(out.to_string_lossy().into_owned());
        }
        Ok(None) => {
            // destination existed; not an error for the batch
            result.success = true;
        }
        Err(e) => {
            warn!(source = %task.input_path, error = %e, "task failed");
            result.error = Some(e.to_string());
        }
    }
    result.process_time_ms = started.elapsed().as_millis() as u64;
    result
}

fn processor_for_task(task: &FileTask, options: &ProcessOptions) -> Processor {
    let input = PathBuf::from(&task.input_path);
    let input_dir = input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let output_dir = task
        .output_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| input_dir.clone());
    Processor {
        input_dir,
        output_dir,
        options: options.clone(),
    }
}

// two-stage pipeline mode

struct PipelineData {
    index: usize,
    task: FileTask,
    started: Instant,

    audio_ext: String,
    audio: Vec<u8>,

    meta: Option<Box<dyn AudioMeta>>,
    cover: Option<bytes::Bytes>,

    output_path: PathBuf,

    error: Option<ProcessError>,
}

fn run_pipeline(
    tasks: Vec<(usize, FileTask)>,
    workers: usize,
    options: &ProcessOptions,
    stop: &Arc<AtomicBool>,
) -> Vec<(usize, ProcessResult)> {
    let stage_workers = (workers / 2).max(1);
    // backpressure comes from the bounded hand-off between the stages
    let (decrypt_tx, decrypt_rx) = bounded::<(usize, FileTask)>(workers);
    let (finalize_tx, finalize_rx) = bounded::<PipelineData>(workers);
    let (result_tx, result_rx) = unbounded::<(usize, ProcessResult)>();

    std::thread::scope(|scope| {
        for _ in 0..stage_workers {
            let decrypt_rx = decrypt_rx.clone();
            let finalize_tx = finalize_tx.clone();
            let options = options.clone();
            scope.spawn(move || {
                for (index, task) in decrypt_rx.iter() {
                    debug!(source = %task.input_path, "decrypt stage start");
                    let data = perform_decrypt(index, task, &options);
                    if finalize_tx.send(data).is_err() {
                        break;
                    }
                }
            });
        }
        drop(decrypt_rx);
        drop(finalize_tx);

        for _ in 0..stage_workers {
            let finalize_rx = finalize_rx.clone();
            let result_tx = result_tx.clone();
            let options = options.clone();
            scope.spawn(move || {
                for data in finalize_rx.iter() {
                    let index = data.index;
                    let result = perform_finalize(data, &options);
                    let _ = result_tx.send((index, result));
                }
            });
        }
        drop(finalize_rx);
        drop(result_tx);

        for item in tasks {
            if stop.load(Ordering::Relaxed) {
                warn!("stop requested, no further tasks will be scheduled");
                break;
            }
            let _ = decrypt_tx.send(item);
        }
        drop(decrypt_tx);

        result_rx.iter().collect()
    })
}

fn perform_decrypt(index: usize, task: FileTask, options: &ProcessOptions) -> PipelineData {
    let started = Instant::now();
    let mut data = PipelineData {
        index,
        task,
        started,
        audio_ext: String::new(),
        audio: Vec::new(),
        meta: None,
        cover: None,
        output_path: PathBuf::new(),
        error: None,
    };
    if let Err(e) = decrypt_into(&mut data, options) {
        data.error = Some(e);
    }
    data
}

fn decrypt_into(data: &mut PipelineData, options: &ProcessOptions) -> Result<(), ProcessError> {
    let input = PathBuf::from(&data.task.input_path);
    if !input.exists() {
        return Err(ProcessError::io(
            &input,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input file does not exist"),
        ));
    }

    let (mut dec, factory) =
        decoder::open_file(&input, options.skip_noop, options.kgg_db_path.clone())?;

    let mut probe = vec![0u8; HEADER_PROBE_SIZE];
    let probe_len = read_full(&mut dec, &mut probe).map_err(|e| ProcessError::io(&input, e))?;
    probe.truncate(probe_len);
    let input_ext = format!(
        ".{}",
        input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase()
    );
    data.audio_ext = sniff::audio_extension_with_smart_fallback(&probe, &input_ext);

    data.audio = probe;
    dec.read_to_end(&mut data.audio)
        .map_err(|e| ProcessError::io(&input, e))?;

    if options.update_metadata {
        let gather_started = Instant::now();
        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let meta: Box<dyn AudioMeta> = match cache::get(&input) {
            Some(cached) => Box::new(cached),
            None => {
                let wrapped = decoder::algo::common::meta::wrap_meta_with_filename(
                    dec.audio_meta(),
                    file_name,
                );
                cache::put(&input, wrapped.as_ref());
                wrapped
            }
        };
        data.meta = Some(meta);
        data.cover = dec.cover_image();
        if gather_started.elapsed() > ffmpeg::METADATA_TIMEOUT {
            return Err(ProcessError::Timeout {
                operation: "metadata",
                seconds: ffmpeg::METADATA_TIMEOUT.as_secs(),
                path: input.clone(),
            });
        }
    }

    let processor = processor_for_task(&data.task, options);
    data.output_path = processor.output_path_for(&input, factory.suffix, &data.audio_ext);
    debug!(
        source = %data.task.input_path,
        destination = %data.output_path.display(),
        format = %data.audio_ext,
        "decrypt stage done"
    );
    Ok(())
}

fn perform_finalize(mut data: PipelineData, options: &ProcessOptions) -> ProcessResult {
    let started = data.started;
    let mut result = ProcessResult {
        input_path: data.task.input_path.clone(),
        output_path: None,
        success: false,
        error: None,
        process_time_ms: 0,
    };
    if let Some(e) = data.error.take() {
        warn!(source = %data.task.input_path, error = %e, "decrypt stage failed");
        result.error = Some(e.to_string());
        result.process_time_ms = started.elapsed().as_millis() as u64;
        return result;
    }
    match finalize_into(&data, options) {
        Ok(Some(out)) => {
            result.success = true;
            result.output_path = Some(out.to_string_lossy().into_owned());
            if options.remove_source {
                if let Err(e) = std::fs::remove_file(&data.task.input_path) {
                    warn!(source = %data.task.input_path, error = %e, "remove source failed");
                }
            }
        }
        Ok(None) => {
            result.success = true;
        }
        Err(e) => {
            warn!(source = %data.task.input_path, error = %e, "finalize stage failed");
            result.error = Some(e.to_string());
        }
    }
    result.process_time_ms = started.elapsed().as_millis() as u64;
    result
}

fn finalize_into(data: &PipelineData, options: &ProcessOptions) -> Result<Option<PathBuf>, ProcessError> {
    let out_path = &data.output_path;
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProcessError::io(parent, e))?;
    }
    if !options.overwrite_output && out_path.exists() {
        warn!(destination = %out_path.display(), "output file already exists, skip");
        return Ok(None);
    }

    match &data.meta {
        None => {
            std::fs::write(out_path, &data.audio).map_err(|e| ProcessError::io(out_path, e))?;
        }
        Some(meta) => {
            let mut temp = tempfile::Builder::new()
                .prefix("um-audio-")
                .suffix(&data.audio_ext)
                .tempfile()
                .map_err(|e| ProcessError::io(out_path, e))?;
            std::io::Write::write_all(&mut temp, &data.audio)
                .map_err(|e| ProcessError::io(out_path, e))?;
            let cover_ext = data.cover.as_deref().and_then(ffmpeg::cover_extension);
            ffmpeg::update_meta(
                out_path,
                &UpdateMetadataParams {
                    audio: temp.path(),
                    audio_ext: &data.audio_ext,
                    meta: meta.as_ref(),
                    album_art: data.cover.as_deref().filter(|_| cover_ext.is_some()),
                    album_art_ext: cover_ext,
                },
            )?;
        }
    }
    Ok(Some(out_path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_rule() {
        // base: cpu count, 0.8 factor for small files
        assert_eq!(calculate_optimal_workers(8, 50, 10 * 1024 * 1024), 8);
        // large batch triples
        assert_eq!(calculate_optimal_workers(4, 150, 10 * 1024 * 1024), 12);
        // medium batch doubles
        assert_eq!(calculate_optimal_workers(4, 30, 10 * 1024 * 1024), 8);
        // tiny batch halves
        assert_eq!(calculate_optimal_workers(8, 3, 10 * 1024 * 1024), 4);
        // large average scales by 1.5
        assert_eq!(calculate_optimal_workers(8, 50, 100 * 1024 * 1024), 12);
        // small average scales by 0.8
        assert_eq!(calculate_optimal_workers(10, 50, 512 * 1024), 8);
        // clamped to [1, 20]
        assert_eq!(calculate_optimal_workers(16, 200, 100 * 1024 * 1024), 20);
        assert_eq!(calculate_optimal_workers(1, 2, 512 * 1024), 1);
    }

    #[test]
    fn test_request_wire_format() {
        let request: BatchRequest = serde_json::from_str(
            r#"{
                "files": [
                    {"input_path": "/a/x.ncm"},
                    {"input_path": "/a/y.mflac", "output_path": "/out", "priority": 1, "file_size": 123}
                ],
                "options": {"update_metadata": true, "naming_format": "title-artist"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.files.len(), 2);
        assert_eq!(request.files[0].input_path, "/a/x.ncm");
        assert_eq!(request.files[0].priority, 0);
        assert_eq!(request.files[1].file_size, 123);
        let options = request.options.into_process_options();
        assert!(options.update_metadata);
        assert_eq!(options.naming_format, decoder::NamingFormat::TitleArtist);
    }

    #[test]
    fn test_response_wire_format() {
        let response = BatchResponse {
            results: vec![ProcessResult {
                input_path: "/a/x.ncm".into(),
                output_path: None,
                success: false,
                error: Some("boom".into()),
                process_time_ms: 7,
            }],
            total_files: 1,
            success_count: 0,
            failed_count: 1,
            total_time_ms: 9,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"total_files\":1"));
        assert!(json.contains("\"process_time_ms\":7"));
        // absent output_path is omitted, not null
        assert!(!json.contains("output_path"));
    }

    #[test]
    fn test_batch_order_preserved_under_priority_reordering() {
        let in_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        // nine small files and one large one, so the priority sort
        // processes them out of request order
        let mut files = Vec::new();
        for i in 0..10 {
            let name = format!("song{:02}.mp3", i);
            let path = in_dir.path().join(&name);
            let mut data = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
            let body = if i == 3 { 2 * 1024 * 1024 } else { 1024 };
            data.extend(std::iter::repeat((i as u8) + 1).take(body));
            std::fs::write(&path, &data).unwrap();
            files.push(FileTask {
                input_path: path.to_string_lossy().into_owned(),
                output_path: Some(out_dir.path().to_string_lossy().into_owned()),
                priority: 0,
                file_size: 0,
            });
        }
        let expected_inputs: Vec<String> = files.iter().map(|f| f.input_path.clone()).collect();

        let options = ProcessOptions {
            skip_noop: false,
            ..Default::default()
        };
        let stop = Arc::new(AtomicBool::new(false));
        let response = process_batch(files, options, stop);

        assert_eq!(response.total_files, 10);
        assert_eq!(response.success_count, 10);
        assert_eq!(response.failed_count, 0);
        for (i, result) in response.results.iter().enumerate() {
            assert_eq!(result.input_path, expected_inputs[i]);
            assert!(result.success, "file {} failed: {:?}", i, result.error);
        }
        for i in 0..10 {
            assert!(out_dir.path().join(format!("song{:02}.mp3", i)).exists());
        }
    }

    #[test]
    fn test_batch_reports_missing_input() {
        let response = process_batch(
            vec![FileTask {
                input_path: "/no/such/file.ncm".into(),
                output_path: None,
                priority: 0,
                file_size: 0,
            }],
            ProcessOptions::default(),
            Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(response.total_files, 1);
        assert_eq!(response.failed_count, 1);
        assert!(!response.results[0].success);
        assert!(response.results[0].error.is_some());
    }

    #[test]
    fn test_priority_sort_small_files_first() {
        let mut tasks: Vec<(usize, FileTask)> = vec![
            (
                0,
                FileTask {
                    input_path: "big".into(),
                    output_path: None,
                    priority: 0,
                    file_size: 10 * 1024 * 1024,
                },
            ),
            (
                1,
                FileTask {
                    input_path: "small".into(),
                    output_path: None,
                    priority: 0,
                    file_size: 1024,
                },
            ),
            (
                2,
                FileTask {
                    input_path: "smaller".into(),
                    output_path: None,
                    priority: 0,
                    file_size: 512,
                },
            ),
        ];
        assign_priorities(&mut tasks);
        sort_by_priority(&mut tasks);
        let order: Vec<&str> = tasks.iter().map(|(_, t)| t.input_path.as_str()).collect();
        assert_eq!(order, vec!["smaller", "small", "big"]);
        assert_eq!(tasks[0].1.priority, 1);
        assert_eq!(tasks[2].1.priority, 2);
    }
}
