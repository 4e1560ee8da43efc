use core::net::Ipv4Addr;

use fugit::HertzU32;

use super::Duration;

/// The ARM core PLL frequency.
pub const ARM_PLL_FREQUENCY: u32 = 666_667_000;

/// The frequency of the global timer used for all timekeeping. The timer is clocked at half of
/// the core frequency.
pub const TICK_HZ: u32 = ARM_PLL_FREQUENCY / 2;

/// The FPGA fabric clock that the ADC sample clock is divided from.
pub const FPGA_CLOCK: HertzU32 = HertzU32::from_raw(100_000_000);

/// The sample clock divider that the board bootstrap programs into the ADC. The sample rate is
/// `FPGA_CLOCK / (2 * divider)`, i.e. 5 MHz.
pub const SAMPLE_CLOCK_DIVIDER: u32 = 10;

/// The number of hydrophone channels in every sample.
pub const CHANNELS: usize = 4;

/// The hydrophone that all arrival times are referred to.
pub const REFERENCE_CHANNEL: usize = 0;

/// The ADC code width. Codes are offset binary.
pub const ADC_RESOLUTION_BITS: u32 = 14;

/// The nominal sample rate used for sizing the sample buffer.
pub const NOMINAL_SAMPLE_RATE: u32 = 5_000_000;

/// The capacity of the sample buffer: 2.2 seconds at the nominal sample rate.
pub const MAX_SAMPLES: usize = NOMINAL_SAMPLE_RATE as usize / 1000 * 2200;

/// The capacity of the correlation curve buffer.
pub const MAX_CORRELATION_POINTS: usize = 50_000;

/// The repetition period of the pinger.
pub const PING_PERIOD: Duration = Duration::millis(2000);

/// The acquisition duration while searching for the ping. Longer than one ping period so that a
/// ping is always contained.
pub const SYNC_DURATION: Duration = Duration::millis(2100);

/// The acquisition duration around a predicted ping.
pub const TRACK_DURATION: Duration = Duration::millis(300);

/// The acquisition duration of raw debug captures.
pub const DEBUG_DURATION: Duration = Duration::millis(2100);

/// How long before a predicted ping the thrusters are silenced and the acquisition starts.
pub const SILENCE_LEAD: Duration = Duration::millis(50);

/// How long the thrusters are silenced for.
pub const SILENCE_DURATION: Duration = Duration::millis(100);

/// The reference-channel magnitude that identifies a ping after startup.
pub const INITIAL_PING_THRESHOLD: u32 = 1500;

// Correlate a window of two wavelengths after the threshold crossing. Before the crossing there
// is either the leading wavefront or the noise floor, which is small enough not to disturb the
// correlation.
pub const PRE_PING_DURATION: Duration = Duration::micros(100);
pub const POST_PING_DURATION: Duration = Duration::micros(50);

/// The largest inter-hydrophone delay searched by the correlator.
pub const MAX_LAG: Duration = Duration::micros(20);

/// Inbound command packets are at most this long (including a terminator).
pub const COMMAND_BUFFER_SIZE: usize = 1024;

/// The maximum number of `key:value` tokens in a command packet.
pub const MAX_COMMAND_TOKENS: usize = 10;

// Network configuration of the device and its host. The board bootstrap
// configures the interface with the device addresses.
pub const IP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 7);
pub const NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);
pub const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const MAC_ADDRESS: [u8; 6] = [0x00, 0x0a, 0x35, 0x00, 0x01, 0x02];
pub const HOST_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);

// UDP ports. The command port is bound locally, all others are remote ports on the host.
pub const COMMAND_PORT: u16 = 3000;
pub const DATA_STREAM_PORT: u16 = 3001;
pub const RESULT_PORT: u16 = 3002;
pub const XCORR_STREAM_PORT: u16 = 3003;
pub const SILENCE_REQUEST_PORT: u16 = 3004;
