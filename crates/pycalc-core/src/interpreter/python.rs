//! Embedded CPython backend.
//!
//! Each session is a `code.InteractiveConsole` with its own namespace. The
//! bootstrap module replaces `sys.stdout`/`sys.stderr` with routers that
//! write into a buffer owned by the calling thread, so a call's output is
//! captured in isolation even while an abandoned worker is still unwinding
//! on another thread.
//!
//! The GIL is taken per call and released between calls; the worker never
//! holds it while waiting for input.

use std::ffi::CString;
use std::os::raw::{c_long, c_ulong};
use std::sync::Arc;

use pyo3::PyTypeInfo;
use pyo3::exceptions::PyKeyboardInterrupt;
use pyo3::prelude::*;
use pyo3::types::PyModule;

use crate::error::{Error, Result};

use super::{Captured, Interrupt, InterpreterSession, SessionBackend, SessionOptions, is_echo};

const BOOTSTRAP: &str = include_str!("bootstrap.py");

/// Backend opening sessions in the embedded CPython interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonBackend;

impl PythonBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SessionBackend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn open(&self, options: &SessionOptions) -> Result<Box<dyn InterpreterSession>> {
        let code = CString::new(BOOTSTRAP)
            .map_err(|e| Error::Interpreter(format!("invalid bootstrap source: {e}")))?;

        let session = Python::attach(|py| PythonSession::open(py, &code, *options))
            .map_err(|e| Error::Interpreter(format!("failed to start Python session: {e}")))?;

        tracing::debug!(thread_id = session.interrupter.thread_id, "Python session opened");
        Ok(Box::new(session))
    }
}

/// Raises `KeyboardInterrupt` asynchronously in the session's thread.
#[derive(Debug)]
struct PythonInterrupt {
    thread_id: c_long,
}

impl Interrupt for PythonInterrupt {
    fn interrupt(&self) -> Result<()> {
        let affected = Python::attach(|py| {
            let exc = PyKeyboardInterrupt::type_object(py);
            // SAFETY: the GIL is held for the duration of the call and `exc`
            // is a live type object borrowed from the interpreter.
            unsafe { pyo3::ffi::PyThreadState_SetAsyncExc(self.thread_id, exc.as_ptr()) }
        });

        match affected {
            0 => {
                tracing::debug!(thread_id = self.thread_id, "No Python frame to interrupt");
                Ok(())
            }
            1 => Ok(()),
            n => Err(Error::Interpreter(format!(
                "interrupt reached {n} thread states for thread {}",
                self.thread_id
            ))),
        }
    }
}

/// One persistent interactive console.
pub struct PythonSession {
    bootstrap: Py<PyModule>,
    console: Py<PyAny>,
    options: SessionOptions,
    interrupter: Arc<PythonInterrupt>,
}

impl PythonSession {
    fn open(py: Python<'_>, code: &CString, options: SessionOptions) -> PyResult<Self> {
        let bootstrap = PyModule::from_code(py, code, c"pycalc_bootstrap.py", c"pycalc_bootstrap")?;
        let console = bootstrap.getattr("open_session")?.call0()?;
        let ident: c_ulong = PyModule::import(py, "threading")?
            .getattr("get_ident")?
            .call0()?
            .extract()?;
        // The C API takes the ident as a signed long and reinterprets it.
        let thread_id = ident as c_long;

        Ok(Self {
            bootstrap: bootstrap.unbind(),
            console: console.unbind(),
            options,
            interrupter: Arc::new(PythonInterrupt { thread_id }),
        })
    }
}

impl InterpreterSession for PythonSession {
    fn run(&mut self, source: &str, multiline: bool) -> Captured {
        let result = Python::attach(|py| -> PyResult<(String, String)> {
            self.bootstrap
                .bind(py)
                .getattr("run")?
                .call1((self.console.bind(py), multiline, source))?
                .extract()
        });

        let mut captured = match result {
            Ok((output, error)) => Captured { output, error },
            // Only reachable when the interrupt lands outside the console's own
            // exception handling.
            Err(err) => Captured::error(format!("{err}\n")),
        };

        if !multiline && self.options.echo_suppression && is_echo(source, &captured.output) {
            captured.output.clear();
        }
        captured
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.interrupter.clone()
    }
}
