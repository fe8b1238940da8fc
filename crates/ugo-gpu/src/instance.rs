//! Vulkan instance creation.

use std::borrow::Cow;
use std::ffi::{c_char, c_void, CStr, CString};

use ash::vk;
use raw_window_handle::RawDisplayHandle;
use tracing::Dispatch;

use crate::error::{GpuError, Result};

/// Standard validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Owned Vulkan instance plus the loaders that hang off it.
///
/// Destroys the debug messenger (if any) and then the instance on drop.
pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    surface_loader: ash::khr::surface::Instance,
    debug: Option<DebugMessenger>,
}

/// Debug messenger plus the log dispatcher its callback reports to.
///
/// The dispatcher is captured when the messenger is created, so messages
/// raised on driver threads reach the same subscriber as the creating thread.
/// `dispatch` must outlive `messenger`.
struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    dispatch: Box<Dispatch>,
}

impl Instance {
    /// Load Vulkan and create an instance able to present to `display`.
    pub fn new(app_name: &str, display: RawDisplayHandle, enable_validation: bool) -> Result<Self> {
        // SAFETY: the loaded library is kept alive by `entry` for the lifetime of `Self`.
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let app_name = CString::new(app_name)
            .map_err(|e| GpuError::InvalidState(format!("Invalid application name: {e}")))?;

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"ugo-vk")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let extension_names = required_instance_extensions(display, enable_validation)?;

        let layer_names: Vec<*const c_char> = if enable_validation {
            // SAFETY: entry is a valid loader.
            let available = unsafe { entry.enumerate_instance_layer_properties()? };
            check_layers(&available, &[VALIDATION_LAYER])?
                .iter()
                .map(|l| l.as_ptr())
                .collect()
        } else {
            Vec::new()
        };

        // Required for MoltenVK on macOS
        #[cfg(target_os = "macos")]
        let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        #[cfg(not(target_os = "macos"))]
        let create_flags = vk::InstanceCreateFlags::empty();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names)
            .flags(create_flags);

        // SAFETY: all pointers in create_info outlive this call.
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let mut this = Self {
            entry,
            instance,
            surface_loader,
            debug: None,
        };

        if enable_validation {
            this.debug = Some(this.create_debug_messenger()?);
        }

        Ok(this)
    }

    fn create_debug_messenger(&self) -> Result<DebugMessenger> {
        let loader = ash::ext::debug_utils::Instance::new(&self.entry, &self.instance);
        let dispatch = Box::new(tracing::dispatcher::get_default(Dispatch::clone));

        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .user_data(std::ptr::from_ref::<Dispatch>(&dispatch).cast_mut().cast());

        // SAFETY: the instance was created with VK_EXT_debug_utils enabled; the boxed
        // dispatcher is destroyed after the messenger.
        let messenger = unsafe { loader.create_debug_utils_messenger(&info, None)? };

        Ok(DebugMessenger {
            loader,
            messenger,
            dispatch,
        })
    }

    /// Get the Vulkan entry point.
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the Vulkan instance handle.
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the surface extension loader.
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: every child object holds an Arc to this instance, so none remain.
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
                drop(debug.dispatch);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Instance extensions needed to present to `display`, plus debug utils when validating.
pub fn required_instance_extensions(
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<Vec<*const c_char>> {
    let mut extensions = ash_window::enumerate_required_extensions(display)?.to_vec();

    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());

    Ok(extensions)
}

/// Check that every layer in `required` appears in `available`.
///
/// Returns the required list unchanged on success.
pub fn check_layers<'a>(
    available: &[vk::LayerProperties],
    required: &[&'a CStr],
) -> Result<Vec<&'a CStr>> {
    for &layer in required {
        let found = available
            .iter()
            .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == layer));
        if !found {
            return Err(GpuError::LayerNotAvailable(layer.to_string_lossy().into_owned()));
        }
    }
    Ok(required.to_vec())
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes a valid callback-data pointer for the duration of the call.
    let message = unsafe { data.as_ref() }
        .and_then(|data| unsafe { data.message_as_c_str() })
        .map_or(Cow::Borrowed("(no message)"), CStr::to_string_lossy);

    let log = || {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            tracing::error!(target: "vulkan", ?message_type, "{message}");
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            tracing::warn!(target: "vulkan", ?message_type, "{message}");
        } else {
            tracing::trace!(target: "vulkan", ?message_type, "{message}");
        }
    };

    // SAFETY: `user_data` is null or the `Dispatch` owned by the messenger's `Instance`.
    match unsafe { user_data.cast::<Dispatch>().as_ref() } {
        Some(dispatch) => tracing::dispatcher::with_default(dispatch, log),
        None => log(),
    }

    vk::FALSE
}
