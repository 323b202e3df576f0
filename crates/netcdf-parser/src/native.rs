//! Thin helpers over the netcdf library.
//!
//! Attribute lookups go through [`has_attr`] first because libnetcdf/HDF5
//! report a missing attribute through the HDF5 error stack.

use std::sync::Once;

/// Turn off HDF5's automatic error stack printing.
///
/// libhdf5 prints a full `HDF5-DIAG` trace to stderr for every failed call,
/// including attribute lookups in this module that are expected to fail on
/// variables without packing or fill attributes. Only the first call has an
/// effect.
pub fn silence_hdf5_errors() {
    static SILENCED: Once = Once::new();

    SILENCED.call_once(|| {
        // SAFETY: a null handler and client data disable automatic printing
        // for the default error stack.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

pub(crate) fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

pub(crate) fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    f32::try_from(attr_value).ok()
}

pub(crate) fn get_string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    let attr_value = var.attribute_value(name)?.ok()?;
    String::try_from(attr_value).ok()
}

/// Values that mark missing data: `_FillValue` and `missing_value`.
pub(crate) fn no_data_values(var: &netcdf::Variable) -> Vec<f32> {
    ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| get_f32_attr(var, name))
        .collect()
}
