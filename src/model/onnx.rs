// 该文件是 Wangyuan （望远） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 检测模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use ort::{
  session::{Session, SessionOutputs, builder::GraphOptimizationLevel},
  value::{DynValue, TensorRef},
};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::ModelConfig,
  decode::{DecodeError, RawDetections, TensorView},
  model::Model,
  normalize::InputTensor,
};

#[derive(Error, Debug)]
pub enum OnnxDetectorError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("创建推理会话失败: {0}")]
  SessionError(String),
  #[error("模型缺少{kind}节点: {name}, 可用节点: {available:?}")]
  MissingNode {
    kind: &'static str,
    name: String,
    available: Vec<String>,
  },
  #[error("推理错误: {0}")]
  InferenceError(String),
  #[error("输出 {0} 不存在")]
  MissingOutput(String),
  #[error("输出 {0} 类型不支持: {1}")]
  OutputType(String, String),
  #[error("输出解码错误: {0}")]
  DecodeError(#[from] DecodeError),
}

impl From<std::io::Error> for OnnxDetectorError {
  fn from(err: std::io::Error) -> Self {
    OnnxDetectorError::ModelLoadError(err)
  }
}

pub struct OnnxDetectorBuilder {
  model_path: PathBuf,
  nodes: ModelConfig,
  intra_threads: Option<usize>,
}

impl OnnxDetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>, nodes: ModelConfig) -> Self {
    Self {
      model_path: model_path.into(),
      nodes,
      intra_threads: None,
    }
  }

  pub fn intra_threads(mut self, threads: Option<usize>) -> Self {
    self.intra_threads = threads;
    self
  }

  pub fn build(self) -> Result<OnnxDetector, OnnxDetectorError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = session_builder(self.intra_threads)?
      .commit_from_memory(&model_data)
      .map_err(|e| OnnxDetectorError::SessionError(e.to_string()))?;
    info!("模型加载完成");

    let inputs: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
    let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    debug!("模型输入节点: {:?}", inputs);
    debug!("模型输出节点: {:?}", outputs);

    check_node("输入", &self.nodes.input, &inputs)?;
    for name in self.nodes.output_names() {
      check_node("输出", name, &outputs)?;
    }

    Ok(OnnxDetector {
      session,
      nodes: self.nodes,
    })
  }
}

fn session_builder(
  intra_threads: Option<usize>,
) -> Result<ort::session::builder::SessionBuilder, OnnxDetectorError> {
  let mut builder = Session::builder()
    .map_err(|e| OnnxDetectorError::SessionError(e.to_string()))?
    .with_optimization_level(GraphOptimizationLevel::Level3)
    .map_err(|e| OnnxDetectorError::SessionError(e.to_string()))?;

  if let Some(threads) = intra_threads {
    builder = builder
      .with_intra_threads(threads)
      .map_err(|e| OnnxDetectorError::SessionError(e.to_string()))?;
  }

  #[cfg(feature = "cuda")]
  {
    use ort::execution_providers::CUDAExecutionProvider;
    info!("启用 CUDA 执行后端");
    builder = builder
      .with_execution_providers([CUDAExecutionProvider::default().build()])
      .map_err(|e| OnnxDetectorError::SessionError(e.to_string()))?;
  }

  Ok(builder)
}

fn check_node(kind: &'static str, name: &str, available: &[String]) -> Result<(), OnnxDetectorError> {
  if available.iter().any(|n| n == name) {
    return Ok(());
  }
  error!("模型缺少{}节点: {}", kind, name);
  Err(OnnxDetectorError::MissingNode {
    kind,
    name: name.to_string(),
    available: available.to_vec(),
  })
}

/// 以 ONNX Runtime 执行的检测网络，输出固定为（框、分数、类别）三路张量
pub struct OnnxDetector {
  session: Session,
  nodes: ModelConfig,
}

impl Model for OnnxDetector {
  type Input = InputTensor;
  type Output = RawDetections;
  type Error = OnnxDetectorError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入: {}", self.nodes.input);
    let tensor = TensorRef::from_array_view(input.data.view())
      .map_err(|e| OnnxDetectorError::InferenceError(e.to_string()))?;

    debug!("执行模型推理");
    let outputs = self
      .session
      .run(ort::inputs![self.nodes.input.as_str() => tensor])
      .map_err(|e| OnnxDetectorError::InferenceError(e.to_string()))?;

    debug!("获取模型输出");
    postprocess(&outputs, &self.nodes)
  }
}

fn postprocess(outputs: &SessionOutputs, nodes: &ModelConfig) -> Result<RawDetections, OnnxDetectorError> {
  let output = |name: &str| {
    outputs
      .get(name)
      .ok_or_else(|| OnnxDetectorError::MissingOutput(name.to_string()))
  };
  let extract_f32 = |name: &str| {
    output(name)?
      .try_extract_tensor::<f32>()
      .map_err(|e| OnnxDetectorError::OutputType(name.to_string(), e.to_string()))
  };

  let (boxes_shape, boxes) = extract_f32(&nodes.boxes)?;
  let (scores_shape, scores) = extract_f32(&nodes.scores)?;
  let (labels_shape, labels) = extract_labels(output(&nodes.labels)?, &nodes.labels)?;

  let raw = RawDetections::from_tensors(
    TensorView::new(boxes_shape, boxes),
    TensorView::new(scores_shape, scores),
    TensorView::new(&labels_shape, &labels),
  )?;
  debug!("模型输出检测槽位 {} 个", raw.len());
  Ok(raw)
}

/// 类别张量可能是 int32、int64 或 float，统一转为 i64
fn extract_labels(value: &DynValue, name: &str) -> Result<(Vec<i64>, Vec<i64>), OnnxDetectorError> {
  if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
    return Ok((shape.to_vec(), data.iter().map(|v| i64::from(*v)).collect()));
  }
  if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
    return Ok((shape.to_vec(), data.to_vec()));
  }
  match value.try_extract_tensor::<f32>() {
    Ok((shape, data)) => Ok((shape.to_vec(), data.iter().map(|v| *v as i64).collect())),
    Err(e) => Err(OnnxDetectorError::OutputType(name.to_string(), e.to_string())),
  }
}
