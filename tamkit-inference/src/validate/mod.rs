use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use anyhow::Result;
use log::{info, warn};
use ort::value::DynValue;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub mod checks;
pub mod probe;

use checks::{
    compatibility_score, round2, Rating, ScoreFacts, HEAVY_MODEL_MB, HIGH_MEMORY_MB,
    LARGE_MODEL_MB, MEDIUM_MODEL_MB,
};
use probe::{estimate_memory_mb, random_input, scan_custom_ops, TensorSpec};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: Map<String, Value>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: Map::new(),
        }
    }
}

impl ValidationReport {
    fn fail(&mut self, error: String) {
        warn!("{}", error);
        self.valid = false;
        self.errors.push(error);
    }

    fn warn(&mut self, warning: String) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn size_mb(&self) -> f64 {
        self.info.get("size_mb").and_then(Value::as_f64).unwrap_or(0.0)
    }

    pub fn quantized(&self) -> bool {
        self.info.get("quantized").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn compatibility_score(&self) -> Option<u32> {
        self.info
            .get("compatibility_score")
            .and_then(Value::as_u64)
            .map(|score| score as u32)
    }

    /// Human readable summary with errors, warnings and recommendations.
    pub fn render_summary(&self) -> String {
        self.to_string()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{}\nVALIDATION SUMMARY\n{}", rule, rule)?;

        if self.valid {
            writeln!(f, "✓ Model is valid")?;
        } else {
            writeln!(f, "✗ Model validation FAILED")?;
        }

        if let Some(score) = self.compatibility_score() {
            writeln!(
                f,
                "\nCompatibility Score: {}/100 ({})",
                score,
                Rating::from_score(score)
            )?;
        }

        if !self.errors.is_empty() {
            writeln!(f, "\nErrors:")?;
            for error in &self.errors {
                writeln!(f, "  ✗ {}", error)?;
            }
        }

        if !self.warnings.is_empty() {
            writeln!(f, "\nWarnings ({}):", self.warnings.len())?;
            for warning in &self.warnings {
                writeln!(f, "  ⚠ {}", warning)?;
            }
        }

        writeln!(f, "\nRecommendations:")?;
        if !self.quantized() {
            writeln!(f, "  1. Apply INT8 quantization for 4x size reduction")?;
        }
        if self.size_mb() > MEDIUM_MODEL_MB {
            writeln!(f, "  2. Consider using a smaller model architecture")?;
        }
        writeln!(f, "  3. Test on real devices for accurate performance")?;
        writeln!(f, "  4. Profile inference time on target hardware")?;

        Ok(())
    }
}

/// Static and optional dynamic checks of one ONNX model file.
pub struct ModelValidator {
    model_path: PathBuf,
    session: Option<OnnxSession>,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
    report: ValidationReport,
}

impl ModelValidator {
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            session: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            report: ValidationReport::default(),
        }
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn into_report(self) -> ValidationReport {
        self.report
    }

    /// Runs every static check; stops early when the file is missing or cannot be loaded.
    pub fn validate(&mut self) -> &ValidationReport {
        info!("Validating model: {}", self.model_path.display());

        if !self.model_path.exists() {
            self.report
                .fail(format!("Model file not found: {}", self.model_path.display()));
            return &self.report;
        }

        if let Err(e) = self.check_file_size() {
            self.report.fail(format!("Cannot read model file: {:#}", e));
            return &self.report;
        }

        match OnnxSession::new(&self.model_path, ExecutionProvider::CPU) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                self.report.fail(format!("Failed to load model: {:#}", e));
                return &self.report;
            }
        }

        self.check_input_output();
        self.check_quantization();
        self.check_operations();
        self.check_memory_usage();
        self.check_compatibility();

        &self.report
    }

    fn check_file_size(&mut self) -> Result<()> {
        let size_mb = std::fs::metadata(&self.model_path)?.len() as f64 / (1024.0 * 1024.0);
        self.report
            .info
            .insert("size_mb".to_string(), json!(round2(size_mb)));

        if size_mb > LARGE_MODEL_MB {
            self.report.warn(format!(
                "Model size ({:.2} MB) is large for edge deployment. Consider using quantization.",
                size_mb
            ));
        } else if size_mb > HEAVY_MODEL_MB {
            self.report.warn(format!(
                "Model size ({:.2} MB) may impact app performance. Quantization recommended.",
                size_mb
            ));
        }
        info!("Model size: {:.2} MB", size_mb);

        Ok(())
    }

    fn check_input_output(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        self.inputs = session
            .inputs
            .iter()
            .map(|input| TensorSpec::from_value_type(&input.name, &input.input_type))
            .collect();
        self.outputs = session
            .outputs
            .iter()
            .map(|output| TensorSpec::from_value_type(&output.name, &output.output_type))
            .collect();

        info!("Input tensors: {}", self.inputs.len());
        for (i, spec) in self.inputs.iter().enumerate() {
            info!("  [{}] {} shape {:?} type {}", i, spec.name, spec.shape, spec.ty);
            if spec.is_dynamic() {
                self.report.warn(format!(
                    "Input tensor {} has dynamic shape {:?}. May not be optimized for edge runtimes.",
                    i, spec.shape
                ));
            }
            self.report
                .info
                .insert(format!("input_{}_shape", i), json!(spec.shape));
            self.report
                .info
                .insert(format!("input_{}_type", i), json!(spec.ty.to_string()));
        }

        info!("Output tensors: {}", self.outputs.len());
        for (i, spec) in self.outputs.iter().enumerate() {
            info!("  [{}] {} shape {:?} type {}", i, spec.name, spec.shape, spec.ty);
            self.report
                .info
                .insert(format!("output_{}_shape", i), json!(spec.shape));
            self.report
                .info
                .insert(format!("output_{}_type", i), json!(spec.ty.to_string()));
        }
    }

    fn check_quantization(&mut self) {
        let quantized = self
            .inputs
            .iter()
            .chain(&self.outputs)
            .any(|spec| spec.ty.is_quantized());
        self.report
            .info
            .insert("quantized".to_string(), json!(quantized));

        if quantized {
            info!("Model is quantized (INT8)");
        } else {
            self.report.warn(
                "Model is not quantized. Consider INT8 quantization for better edge performance \
                 (4x smaller, 2-4x faster)."
                    .to_string(),
            );
        }
    }

    fn check_operations(&mut self) {
        match std::fs::read(&self.model_path) {
            Ok(content) => {
                let markers = scan_custom_ops(&content);
                if markers.is_empty() {
                    info!("Model uses standard operators only");
                } else {
                    self.report.warn(format!(
                        "Model contains non-standard operators ({}). May have compatibility issues \
                         on some runtimes. Consider using only built-in operators.",
                        markers.join(", ")
                    ));
                }
            }
            Err(e) => self
                .report
                .warn(format!("Could not check operations: {}", e)),
        }
    }

    fn check_memory_usage(&mut self) {
        let memory_mb = estimate_memory_mb(self.inputs.iter().chain(&self.outputs));
        self.report
            .info
            .insert("estimated_memory_mb".to_string(), json!(round2(memory_mb)));
        info!("Estimated memory usage: {:.2} MB", memory_mb);

        if memory_mb > HIGH_MEMORY_MB {
            self.report.warn(format!(
                "High memory usage ({:.2} MB). May cause OOM errors on low-end devices.",
                memory_mb
            ));
        }
    }

    fn check_compatibility(&mut self) {
        let facts = ScoreFacts {
            quantized: self.report.quantized(),
            size_mb: self.report.size_mb(),
            memory_mb: self
                .report
                .info
                .get("estimated_memory_mb")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            warnings: self.report.warnings.len(),
        };
        let score = compatibility_score(&facts);
        info!("Compatibility Score: {}/100, {}", score, Rating::from_score(score));

        self.report
            .info
            .insert("compatibility_score".to_string(), json!(score));
    }

    /// One forward pass on random inputs; a failure is recorded as a warning.
    pub fn test_inference(&mut self) {
        if !self.report.valid {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        info!("Running test inference...");

        let mut rng = StdRng::from_entropy();
        let inputs = self
            .inputs
            .iter()
            .map(|spec| Ok((spec.name.clone(), random_input(spec, &mut rng)?)))
            .collect::<Result<Vec<_>>>();

        let outcome = inputs.and_then(|inputs| {
            let start = Instant::now();
            let outputs = session
                .run(inputs)?
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<String, DynValue>>();
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;
            for (name, value) in &outputs {
                if let Ok(tensor) = value.try_extract_array::<f32>() {
                    info!("  Output {} shape: {:?}", name, tensor.shape());
                }
            }
            Ok(elapsed)
        });

        match outcome {
            Ok(elapsed) => {
                info!("Test inference successful, CPU inference time: {:.2} ms", elapsed);
                self.report
                    .info
                    .insert("cpu_inference_ms".to_string(), json!(round2(elapsed)));
            }
            Err(e) => self.report.warn(format!("Test inference failed: {:#}", e)),
        }
    }
}
