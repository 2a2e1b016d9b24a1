//! Vulkan device context.
//!
//! This module owns the physical device selection, the logical device, the
//! single graphics queue, and the pools every dependent object allocates
//! from. It is the leaf dependency of the whole renderer: all GPU objects
//! are created through it and must be destroyed before it.
//!
//! # Selection policy
//!
//! - Physical device: the first enumerated device is taken. There is no
//!   scoring; the enumeration is logged for diagnostics only.
//! - Queue family: the first family advertising `GRAPHICS` is used, with a
//!   single queue at priority 1.0. Presentability to a concrete surface is
//!   verified separately when the swapchain is bound.
//!
//! # Example
//!
//! ```no_run
//! use vkdemo_rhi::instance::Instance;
//! use vkdemo_rhi::device::Device;
//!
//! let instance = Instance::new(cfg!(debug_assertions)).expect("instance");
//! let device = Device::new(&instance).expect("device");
//! let queue = device.graphics_queue();
//! ```

use std::ffi::CStr;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::RhiError;
use crate::instance::Instance;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Pool sizing for the shared descriptor pool.
const DESCRIPTOR_POOL_MAX_SETS: u32 = 64;

/// Vulkan logical device wrapper.
///
/// Owns the logical device, the graphics queue, the graphics command pool,
/// the descriptor pool, and the GPU memory allocator.
///
/// # Thread Safety
///
/// The [`Device`] is designed to be shared across the renderer using `Arc`.
/// The internal allocator is protected by a `Mutex`.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// Cached physical device properties (name, limits).
    properties: vk::PhysicalDeviceProperties,
    /// GPU memory allocator (thread-safe via Mutex).
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Index of the graphics queue family.
    graphics_family: u32,
    /// Command pool for graphics command buffers.
    command_pool: vk::CommandPool,
    /// Shared descriptor pool.
    descriptor_pool: vk::DescriptorPool,
}

impl Device {
    /// Creates the device context.
    ///
    /// Selects the first physical device and its first graphics-capable
    /// queue family, creates the logical device with one queue at priority
    /// 1.0, then creates the graphics command pool, the descriptor pool,
    /// and the memory allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoDevice`] when no physical device exists and
    /// [`RhiError::NoGraphicsQueue`] when no queue family supports
    /// graphics. Any underlying API failure is returned as-is; callers
    /// treat device-context failures as fatal.
    pub fn new(instance: &Instance) -> Result<Arc<Self>, RhiError> {
        let physical_device = select_physical_device(instance.handle())?;
        log_device_extensions(instance.handle(), physical_device)?;

        let graphics_family = find_graphics_family(instance.handle(), physical_device)?;

        let queue_priorities = [1.0f32];
        let queue_create_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_family)
            .queue_priorities(&queue_priorities);

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extension_names);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device, &create_info, None)?
        };

        let properties = unsafe {
            instance
                .handle()
                .get_physical_device_properties(physical_device)
        };

        info!(
            "Logical device created on queue family {} with {} extension(s)",
            graphics_family,
            DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };

        // Individual command buffers are reset and re-recorded every frame.
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };
        debug!("Graphics command pool created");

        let descriptor_pool = create_descriptor_pool(&device)?;
        debug!("Descriptor pool created");

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device,
            properties,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            graphics_family,
            command_pool,
            descriptor_pool,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the graphics queue family index.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Returns the graphics command pool handle.
    #[inline]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Returns the shared descriptor pool handle.
    #[inline]
    pub fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.descriptor_pool
    }

    /// Returns a reference to the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Waits for the device to become idle.
    ///
    /// Blocks until all outstanding operations on all queues have
    /// completed. Used before destroying resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> Result<(), RhiError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.device.destroy_command_pool(self.command_pool, None);

            // The allocator must release its memory blocks while the device
            // is still alive.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, the raw handles are Copy, and the
// allocator is protected by a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Selects the physical device.
///
/// The enumeration is logged; the first device is taken.
fn select_physical_device(instance: &ash::Instance) -> Result<vk::PhysicalDevice, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        return Err(RhiError::NoDevice);
    }

    info!("Available physical devices ({}):", devices.len());
    for &device in &devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        info!(
            "  {} (id {}, {:?})",
            name.to_string_lossy(),
            properties.device_id,
            properties.device_type
        );
    }

    Ok(devices[0])
}

/// Finds the first queue family with graphics capability.
fn find_graphics_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<u32, RhiError> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
        .ok_or(RhiError::NoGraphicsQueue)
}

/// Logs the available device extensions (diagnostic only).
fn log_device_extensions(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<(), RhiError> {
    let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device)? };
    debug!("Available device extensions ({}):", extensions.len());
    for extension in &extensions {
        let name = unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) };
        debug!("  {}", name.to_string_lossy());
    }
    Ok(())
}

/// Creates the shared descriptor pool.
fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool, RhiError> {
    let pool_sizes = [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: DESCRIPTOR_POOL_MAX_SETS,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: DESCRIPTOR_POOL_MAX_SETS,
        },
    ];

    let create_info = vk::DescriptorPoolCreateInfo::default()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(DESCRIPTOR_POOL_MAX_SETS)
        .pool_sizes(&pool_sizes);

    let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        // Compile-time check that Device is Send + Sync
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
