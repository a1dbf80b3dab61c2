//! 可绑定的函数槽。
//!
//! `Func<fn(Exec, i64) -> Result<Product, Error>>` 声明一个由查询绑定出的函数：
//! 类型参数给出签名，首个参数的标记类型决定调用约定：
//!
//! - `fn(Exec, ..)`：通过 [`Executor`] 执行写操作；
//! - `fn(Query, ..)`：通过 [`Querier`] 执行读操作；
//! - `fn(Ctx, Exec, ..)` / `fn(Ctx, Query, ..)`：同上，并携带 [`Context`]。
//!
//! 未绑定的槽被调用时返回 [`Error::Unbound`]（或没有错误输出时返回零值）。

use crate::api::{ContextExecutor, ContextQuerier, Executor, Querier};
use crate::context::Context;
use crate::error::Error;
use crate::mapper::Mapped;
use crate::param::{Param, ToParam};
use crate::signature::{InputType, OutputType, Signature};
use crate::value::SqlValue;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, SyncSender};

/// 签名标记：执行写操作的能力。
#[derive(Debug, Clone, Copy)]
pub struct Exec;

/// 签名标记：执行读操作的能力。
#[derive(Debug, Clone, Copy)]
pub struct Query;

/// 签名标记：取消/超时上下文。
#[derive(Debug, Clone, Copy)]
pub struct Ctx;

/// 可以出现在函数签名中的参数类型。
pub trait Arg: 'static {
    fn input_type() -> InputType;
}

impl<T: ToParam + 'static> Arg for T {
    fn input_type() -> InputType {
        InputType::Value(T::param_type())
    }
}

impl Arg for Exec {
    fn input_type() -> InputType {
        InputType::Executor
    }
}

impl Arg for Query {
    fn input_type() -> InputType {
        InputType::Querier
    }
}

impl Arg for Ctx {
    fn input_type() -> InputType {
        InputType::Context
    }
}

impl<T: 'static> Arg for Sender<T> {
    fn input_type() -> InputType {
        InputType::Channel
    }
}

impl<T: 'static> Arg for SyncSender<T> {
    fn input_type() -> InputType {
        InputType::Channel
    }
}

impl<T: 'static> Arg for Receiver<T> {
    fn input_type() -> InputType {
        InputType::Channel
    }
}

/// 函数的返回形状。
pub trait Returns: Sized + 'static {
    /// 由结果构造的值类型。
    type Value: Mapped;

    fn output_types() -> Vec<OutputType>;

    /// 把运行结果转换为返回值；`Ok(None)` 表示没有值可返回。
    fn deliver(result: Result<Option<Self::Value>, Error>) -> Self;
}

/// 没有返回值：只执行，结果与错误都被丢弃。
impl Returns for () {
    type Value = SqlValue;

    fn output_types() -> Vec<OutputType> {
        Vec::new()
    }

    fn deliver(result: Result<Option<SqlValue>, Error>) -> Self {
        if let Err(err) = result {
            tracing::debug!(error = %err, "call.error_dropped");
        }
    }
}

impl Returns for Result<(), Error> {
    type Value = SqlValue;

    fn output_types() -> Vec<OutputType> {
        vec![OutputType::Error]
    }

    fn deliver(result: Result<Option<SqlValue>, Error>) -> Self {
        result.map(|_| ())
    }
}

/// 只有值输出：出错时返回零值。
impl<T: Mapped> Returns for T {
    type Value = T;

    fn output_types() -> Vec<OutputType> {
        vec![T::output_type()]
    }

    fn deliver(result: Result<Option<T>, Error>) -> Self {
        match result {
            Ok(Some(v)) => v,
            Ok(None) => T::zero(),
            Err(err) => {
                tracing::debug!(error = %err, "call.error_dropped");
                T::zero()
            }
        }
    }
}

impl<T: Mapped> Returns for Result<T, Error> {
    type Value = T;

    fn output_types() -> Vec<OutputType> {
        vec![T::output_type(), OutputType::Error]
    }

    fn deliver(result: Result<Option<T>, Error>) -> Self {
        result.map(|v| v.unwrap_or_else(T::zero))
    }
}

/// 可以声明为函数槽的函数指针类型。
pub trait Bindable: 'static {
    type Ret: Returns;

    fn signature() -> Signature;
}

macro_rules! bindable_fn {
    ($($A:ident),*) => {
        impl<R: Returns, $($A: Arg),*> Bindable for fn($($A),*) -> R {
            type Ret = R;

            fn signature() -> Signature {
                Signature::new(vec![$($A::input_type()),*], R::output_types())
            }
        }
    };
}

bindable_fn!();
bindable_fn!(A0);
bindable_fn!(A0, A1);
bindable_fn!(A0, A1, A2);
bindable_fn!(A0, A1, A2, A3);
bindable_fn!(A0, A1, A2, A3, A4);
bindable_fn!(A0, A1, A2, A3, A4, A5);
bindable_fn!(A0, A1, A2, A3, A4, A5, A6);
bindable_fn!(A0, A1, A2, A3, A4, A5, A6, A7);

/// 调用时传入的连接。
#[derive(Clone, Copy)]
pub enum Conn<'a> {
    Exec(&'a dyn Executor),
    Query(&'a dyn Querier),
    ContextExec(&'a Context, &'a dyn ContextExecutor),
    ContextQuery(&'a Context, &'a dyn ContextQuerier),
}

impl fmt::Debug for Conn<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Conn::Exec(_) => "Exec",
            Conn::Query(_) => "Query",
            Conn::ContextExec(..) => "ContextExec",
            Conn::ContextQuery(..) => "ContextQuery",
        };
        f.debug_tuple("Conn").field(&kind).finish()
    }
}

/// 绑定完成的实现。
pub type BoundFn<V> =
    Arc<dyn for<'a> Fn(Conn<'a>, Vec<Param>) -> Result<Option<V>, Error> + Send + Sync>;

pub(crate) type ValueOf<S> = <<S as Bindable>::Ret as Returns>::Value;

/// 函数槽。
pub struct Func<S: Bindable> {
    imp: Option<BoundFn<ValueOf<S>>>,
    _sig: PhantomData<fn() -> S>,
}

impl<S: Bindable> Default for Func<S> {
    fn default() -> Self {
        Self {
            imp: None,
            _sig: PhantomData,
        }
    }
}

impl<S: Bindable> Clone for Func<S> {
    fn clone(&self) -> Self {
        Self {
            imp: self.imp.clone(),
            _sig: PhantomData,
        }
    }
}

impl<S: Bindable> fmt::Debug for Func<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("signature", &std::any::type_name::<S>())
            .field("bound", &self.imp.is_some())
            .finish()
    }
}

impl<S: Bindable> Func<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signature() -> Signature {
        S::signature()
    }

    pub fn is_bound(&self) -> bool {
        self.imp.is_some()
    }

    fn invoke(&self, conn: Conn<'_>, args: Vec<Param>) -> S::Ret {
        let result = match &self.imp {
            Some(imp) => imp(conn, args),
            None => Err(Error::Unbound),
        };
        <S::Ret as Returns>::deliver(result)
    }
}

/// 已编译、尚未安装的实现。
pub struct Staged<S: Bindable> {
    imp: BoundFn<ValueOf<S>>,
    _sig: PhantomData<fn() -> S>,
}

impl<S: Bindable> Staged<S> {
    pub(crate) fn new(imp: BoundFn<ValueOf<S>>) -> Self {
        Self {
            imp,
            _sig: PhantomData,
        }
    }

    pub fn install(self, slot: &mut Func<S>) {
        slot.imp = Some(self.imp);
    }
}

impl<S: Bindable> fmt::Debug for Staged<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Staged")
            .field(&std::any::type_name::<S>())
            .finish()
    }
}

macro_rules! func_call {
    ($($A:ident $a:ident),*) => {
        impl<R: Returns, $($A: ToParam + 'static),*> Func<fn(Exec, $($A),*) -> R> {
            pub fn call(&self, exec: &dyn Executor, $($a: $A),*) -> R {
                self.invoke(Conn::Exec(exec), vec![$($a.to_param()),*])
            }
        }

        impl<R: Returns, $($A: ToParam + 'static),*> Func<fn(Query, $($A),*) -> R> {
            pub fn call(&self, query: &dyn Querier, $($a: $A),*) -> R {
                self.invoke(Conn::Query(query), vec![$($a.to_param()),*])
            }
        }

        impl<R: Returns, $($A: ToParam + 'static),*> Func<fn(Ctx, Exec, $($A),*) -> R> {
            pub fn call(&self, ctx: &Context, exec: &dyn ContextExecutor, $($a: $A),*) -> R {
                self.invoke(Conn::ContextExec(ctx, exec), vec![$($a.to_param()),*])
            }
        }

        impl<R: Returns, $($A: ToParam + 'static),*> Func<fn(Ctx, Query, $($A),*) -> R> {
            pub fn call(&self, ctx: &Context, query: &dyn ContextQuerier, $($a: $A),*) -> R {
                self.invoke(Conn::ContextQuery(ctx, query), vec![$($a.to_param()),*])
            }
        }
    };
}

func_call!();
func_call!(A0 a0);
func_call!(A0 a0, A1 a1);
func_call!(A0 a0, A1 a1, A2 a2);
func_call!(A0 a0, A1 a1, A2 a2, A3 a3);
func_call!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
func_call!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
