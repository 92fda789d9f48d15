use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::{ExtractorConfig, Mode};
use crate::error::Error;
use crate::source::{DocumentSource, PdfSource};

fn to_py_err(err: Error) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

#[pyfunction]
fn page_count(path: &str) -> PyResult<usize> {
    let source = PdfSource::open(path).map_err(|e| to_py_err(e.into()))?;
    Ok(source.page_count())
}

/// Highlights as dicts with `text`, `color`, `page` and `x`/`y`/`width`/`height`.
#[pyfunction]
#[pyo3(signature = (path, mode = "geometric"))]
fn extract_highlights(py: Python<'_>, path: &str, mode: &str) -> PyResult<Vec<Py<PyDict>>> {
    let mode: Mode = mode.parse().map_err(PyValueError::new_err)?;
    let config = ExtractorConfig::new().with_mode(mode);
    let extraction = crate::extract_file(path, &config).map_err(to_py_err)?;

    let mut output = Vec::with_capacity(extraction.results.len());
    for result in extraction.results {
        let dict = PyDict::new(py);
        dict.set_item("text", result.text)?;
        dict.set_item("color", result.color.as_str())?;
        dict.set_item("page", result.page)?;
        dict.set_item("x", result.region.x as f64)?;
        dict.set_item("y", result.region.y as f64)?;
        dict.set_item("width", result.region.width as f64)?;
        dict.set_item("height", result.region.height as f64)?;
        output.push(dict.unbind());
    }
    Ok(output)
}

#[pymodule]
fn pdfhighlights(_py: Python, m: &Bound<PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(page_count, m)?)?;
    m.add_function(wrap_pyfunction!(extract_highlights, m)?)?;
    Ok(())
}
