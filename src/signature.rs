//! 绑定函数的签名描述与调用约定校验。

use crate::param::ParamType;
use crate::template::ParamTypes;
use crate::value::ScalarKind;
use std::fmt;

/// 输入参数的类别。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    /// 取消/超时上下文。
    Context,
    /// 执行写操作的能力。
    Executor,
    /// 执行读操作的能力。
    Querier,
    /// 通道/流类型，不允许作为参数。
    Channel,
    Value(ParamType),
}

/// 返回值的类别。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputType {
    Scalar(ScalarKind),
    Optional(Box<OutputType>),
    List(Box<OutputType>),
    Map { string_keys: bool },
    Struct(&'static str),
    /// 执行器返回的结果句柄。
    ResultHandle,
    Error,
    Channel,
}

/// 函数签名：输入与输出的类别序列。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    pub inputs: Vec<InputType>,
    pub outputs: Vec<OutputType>,
}

impl Signature {
    pub fn new(inputs: Vec<InputType>, outputs: Vec<OutputType>) -> Self {
        Self { inputs, outputs }
    }
}

impl ParamTypes for Signature {
    fn param_type(&self, position: usize) -> Option<&ParamType> {
        match self.inputs.get(position) {
            Some(InputType::Value(ty)) => Some(ty),
            _ => None,
        }
    }
}

/// 四种调用约定：{有/无 Context} × {写/读}。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    Exec,
    Query,
    ContextExec,
    ContextQuery,
}

impl Convention {
    /// 第一个值参数的位置。
    pub fn start(self) -> usize {
        match self {
            Self::Exec | Self::Query => 1,
            Self::ContextExec | Self::ContextQuery => 2,
        }
    }

    pub fn is_exec(self) -> bool {
        matches!(self, Self::Exec | Self::ContextExec)
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exec => "Executor",
            Self::Query => "Querier",
            Self::ContextExec => "Context+Executor",
            Self::ContextQuery => "Context+Querier",
        };
        f.write_str(s)
    }
}

/// 签名校验错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("need to supply an Executor or Querier parameter")]
    MissingCapability,
    #[error("first parameter must be of type Context, Executor, or Querier")]
    InvalidLeadingParameter,
    #[error("Context, Executor, and Querier may only appear as leading parameters")]
    MisplacedCapability,
    #[error("no input parameter can be a channel")]
    ChannelParameter,
    #[error("must return 0, 1, or 2 values")]
    TooManyOutputs,
    #[error("2nd output parameter must be of type error")]
    SecondOutputNotError,
    #[error("1st output parameter cannot be a channel")]
    ChannelOutput,
    #[error("the 1st output parameter of an Executor must be i64 or a result handle")]
    ExecutorOutput,
    #[error("the 1st output parameter of a Querier cannot be a result handle")]
    QuerierResultHandle,
}

/// 校验签名并返回适用的调用约定。
pub fn validate(sig: &Signature) -> Result<Convention, SignatureError> {
    let convention = match sig.inputs.as_slice() {
        [] => return Err(SignatureError::MissingCapability),
        [InputType::Context, InputType::Executor, ..] => Convention::ContextExec,
        [InputType::Context, InputType::Querier, ..] => Convention::ContextQuery,
        [InputType::Context, ..] => return Err(SignatureError::InvalidLeadingParameter),
        [InputType::Executor, ..] => Convention::Exec,
        [InputType::Querier, ..] => Convention::Query,
        _ => return Err(SignatureError::InvalidLeadingParameter),
    };

    for input in &sig.inputs[convention.start()..] {
        match input {
            InputType::Channel => return Err(SignatureError::ChannelParameter),
            InputType::Context | InputType::Executor | InputType::Querier => {
                return Err(SignatureError::MisplacedCapability);
            }
            InputType::Value(_) => {}
        }
    }

    if sig.outputs.len() > 2 {
        return Err(SignatureError::TooManyOutputs);
    }
    if let Some(second) = sig.outputs.get(1) {
        if *second != OutputType::Error {
            return Err(SignatureError::SecondOutputNotError);
        }
    }
    if let Some(first) = sig.outputs.first() {
        match first {
            OutputType::Channel => return Err(SignatureError::ChannelOutput),
            OutputType::Scalar(ScalarKind::I64) | OutputType::ResultHandle
                if convention.is_exec() => {}
            _ if convention.is_exec() => return Err(SignatureError::ExecutorOutput),
            OutputType::ResultHandle => return Err(SignatureError::QuerierResultHandle),
            _ => {}
        }
    }
    Ok(convention)
}
