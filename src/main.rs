//! RC car controller - main entry point
//!
//! On ESP-IDF:
//! 1. Validate configuration, bring up capture, tachometer, trigger and PWM
//! 2. Start the producer on Core 0 and the actuation consumer on Core 1
//! 3. Start the telemetry server (one client at a time)
//! 4. Drain the log rings to the console forever
//!
//! On the host the same pipeline runs against simulated sensor signals and
//! prints telemetry to stdout for a few seconds.

use rc_car_controller::capture::CaptureChannels;
use rc_car_controller::fault::FaultState;
use rc_car_controller::latch::Latch;
use rc_car_controller::producer::ActuationQueue;
use rc_car_controller::telemetry::{LinkState, TelemetryQueue};

// Capture latches (written from ISR/timer context)
static PULSE_LATCH: Latch = Latch::new();
static THROTTLE_IN_LATCH: Latch = Latch::new();
static ECHO_LATCH: Latch = Latch::new();

// Pipeline state
static FAULTS: FaultState = FaultState::new();
static ACTUATION: ActuationQueue = ActuationQueue::new();
static TELEMETRY: TelemetryQueue = TelemetryQueue::new();
static LINK: LinkState = LinkState::new();

fn channels() -> CaptureChannels<'static> {
    CaptureChannels {
        pulses: &PULSE_LATCH,
        throttle_in: &THROTTLE_IN_LATCH,
        echo: &ECHO_LATCH,
    }
}

/// Console sink for the log drain.
struct Console;

impl core::fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        use std::io::Write;
        std::io::stderr()
            .write_all(s.as_bytes())
            .map_err(|_| core::fmt::Error)
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    esp_idf_svc::sys::link_patches();
    println!("{}", env!("VERSION_STRING"));

    match target::run() {
        Ok(never) => match never {},
        Err(e) => {
            println!("E (0) main: startup failed: {}", e);
            panic!("startup failed: {}", e);
        }
    }
}

#[cfg(target_os = "espidf")]
mod target {
    use core::convert::Infallible;
    use core::time::Duration;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::os::fd::AsRawFd;

    use esp_idf_svc::hal::cpu::Core;
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::gpio::AnyOutputPin;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
    use esp_idf_svc::sys;
    use esp_idf_svc::timer::EspTaskTimerService;
    use static_cell::StaticCell;

    use rc_car_controller::capture::{EdgePairCapture, PulseLatcher};
    use rc_car_controller::config::ControllerConfig;
    use rc_car_controller::consumer::ActuationConsumer;
    use rc_car_controller::convert::Calibration;
    use rc_car_controller::hal::{
        EchoTrigger, EdgeCaptureUnit, EspClock, SetupError, Tachometer, ThrottleOutput,
    };
    use rc_car_controller::log_drain::LogDrain;
    use rc_car_controller::log_globals::{CONTROL_LOG, NET_LOG};
    use rc_car_controller::producer::MeasurementProducer;
    use rc_car_controller::schedule::Clock;
    use rc_car_controller::tasks;
    use rc_car_controller::telemetry::TelemetryFanout;
    use rc_car_controller::transmitter::{ClientLink, LinkError, TelemetryTransmitter};

    use super::{
        channels, Console, ACTUATION, ECHO_LATCH, FAULTS, LINK, PULSE_LATCH, TELEMETRY,
        THROTTLE_IN_LATCH,
    };

    static THROTTLE_IN_CAPTURE: StaticCell<EdgePairCapture<'static>> = StaticCell::new();
    static ECHO_CAPTURE: StaticCell<EdgePairCapture<'static>> = StaticCell::new();

    const CONTROL_PRIORITY: u8 = 20;
    const CONTROL_STACK: usize = 8 * 1024;
    const NET_STACK: usize = 6 * 1024;
    const LOG_DRAIN_PERIOD_MS: u32 = 20;

    pub fn run() -> Result<Infallible, SetupError> {
        let config = ControllerConfig::DEFAULT;
        config.validate()?;

        let peripherals = Peripherals::take()?;
        let timers = EspTaskTimerService::new()?;

        // Edge capture: throttle input and echo
        let mut capture_unit = EdgeCaptureUnit::new()?;
        let capture_clock_hz = match capture_unit.resolution_hz() {
            Ok(hz) if hz > 0 => hz,
            _ => config.capture_clock_hz,
        };
        let calibration = Calibration::new(&config, capture_clock_hz)?;

        let throttle_in = THROTTLE_IN_CAPTURE
            .init(EdgePairCapture::new(&THROTTLE_IN_LATCH).with_faults(&FAULTS));
        let _throttle_in_channel = capture_unit.attach(config.pins.throttle_in, throttle_in)?;
        let echo = ECHO_CAPTURE.init(EdgePairCapture::new(&ECHO_LATCH).with_faults(&FAULTS));
        let _echo_channel = capture_unit.attach(config.pins.echo, echo)?;

        // Pulse counting and ultrasonic trigger
        let _tachometer = Tachometer::start(
            config.pins.tachometer,
            config.pulse_counter_limit(),
            Duration::from_millis(config.tacho_latch_period_ms as u64),
            &timers,
            PulseLatcher::new(&PULSE_LATCH),
        )?;
        // SAFETY: pin numbers come from the board configuration and are used once
        let trigger_pin = unsafe { AnyOutputPin::new(config.pins.echo_trigger) };
        let _echo_trigger = EchoTrigger::start(
            trigger_pin,
            Duration::from_millis(config.echo_trigger_period_ms as u64),
            &timers,
        )?;

        // Throttle output, stationary until the first sample
        let throttle_pin = unsafe { AnyOutputPin::new(config.pins.throttle_out) };
        let throttle = ThrottleOutput::new(
            peripherals.ledc.timer0,
            peripherals.ledc.channel0,
            throttle_pin,
            config.pwm_freq_hz,
            config.stationary_command(),
        )?;

        let producer = MeasurementProducer::new(
            &config,
            calibration,
            channels(),
            &ACTUATION,
            TelemetryFanout::new(&TELEMETRY, &LINK),
            &FAULTS,
            &CONTROL_LOG,
        );
        let consumer = ActuationConsumer::new(&config, throttle, &ACTUATION, &FAULTS, &CONTROL_LOG);
        let period_us = config.sample_period_us();

        spawn_pinned(b"producer\0", Core::Core0, move || {
            tasks::run_producer(producer, period_us, &EspClock)
        })?;
        spawn_pinned(b"actuation\0", Core::Core1, move || {
            tasks::run_consumer(consumer, period_us, &EspClock)
        })?;

        ThreadSpawnConfiguration::default().set()?;
        let port = config.telemetry_port;
        std::thread::Builder::new()
            .stack_size(NET_STACK)
            .spawn(move || serve_telemetry(port))
            .map_err(|_| SetupError::Spawn)?;

        rc_car_controller::rt_info!(
            CONTROL_LOG,
            "main",
            EspClock.now_us(),
            "running: capture clock {} Hz, period {} us",
            capture_clock_hz,
            period_us
        );

        let mut log_drain = LogDrain::default();
        let mut console = Console;
        loop {
            let now_us = EspClock.now_us();
            log_drain.poll(now_us, &CONTROL_LOG, &NET_LOG, &FAULTS, &mut console);
            FreeRtos::delay_ms(LOG_DRAIN_PERIOD_MS);
        }
    }

    fn spawn_pinned<F>(name: &'static [u8], core: Core, body: F) -> Result<(), SetupError>
    where
        F: FnOnce() + Send + 'static,
    {
        ThreadSpawnConfiguration {
            name: Some(name),
            stack_size: CONTROL_STACK,
            priority: CONTROL_PRIORITY,
            pin_to_core: Some(core),
            ..Default::default()
        }
        .set()?;

        std::thread::Builder::new()
            .stack_size(CONTROL_STACK)
            .spawn(body)
            .map(|_| ())
            .map_err(|_| SetupError::Spawn)
    }

    /// TCP stream of one telemetry client.
    struct TcpLink(TcpStream);

    impl ClientLink for TcpLink {
        fn send_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
            use std::io::ErrorKind;
            self.0.write_all(bytes).map_err(|e| match e.kind() {
                ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::WriteZero => LinkError::Closed,
                _ => LinkError::Io,
            })
        }
    }

    /// Detect silently vanished clients: idle 5 s, probe every 5 s, 3 probes.
    fn enable_keepalive(stream: &TcpStream) {
        let fd = stream.as_raw_fd();
        let options = [
            (sys::SOL_SOCKET as i32, sys::SO_KEEPALIVE as i32, 1i32),
            (sys::IPPROTO_TCP as i32, sys::TCP_KEEPIDLE as i32, 5),
            (sys::IPPROTO_TCP as i32, sys::TCP_KEEPINTVL as i32, 5),
            (sys::IPPROTO_TCP as i32, sys::TCP_KEEPCNT as i32, 3),
        ];
        for (level, name, value) in options {
            // SAFETY: fd is an open socket, value outlives the call
            unsafe {
                sys::lwip_setsockopt(
                    fd,
                    level,
                    name,
                    &value as *const i32 as *const core::ffi::c_void,
                    core::mem::size_of::<i32>() as u32,
                );
            }
        }
    }

    fn serve_telemetry(port: u16) -> ! {
        let transmitter = TelemetryTransmitter::new(&TELEMETRY, &LINK, &FAULTS, &NET_LOG);
        loop {
            let listener = match TcpListener::bind(("0.0.0.0", port)) {
                Ok(listener) => listener,
                Err(e) => {
                    rc_car_controller::rt_error!(
                        NET_LOG,
                        "telemetry",
                        EspClock.now_us(),
                        "bind :{} failed: {}",
                        port,
                        e
                    );
                    FreeRtos::delay_ms(1000);
                    continue;
                }
            };
            rc_car_controller::rt_info!(
                NET_LOG,
                "telemetry",
                EspClock.now_us(),
                "listening on :{}",
                port
            );

            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        enable_keepalive(&stream);
                        let mut link = TcpLink(stream);
                        transmitter.serve(&mut link, &EspClock);
                    }
                    Err(e) => {
                        rc_car_controller::rt_error!(
                            NET_LOG,
                            "telemetry",
                            EspClock.now_us(),
                            "accept failed: {}",
                            e
                        );
                    }
                }
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    host::run();
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::io::Write;
    use std::thread;
    use std::time::{Duration, Instant};

    use rc_car_controller::capture::{Edge, EdgePairCapture, PulseLatcher};
    use rc_car_controller::config::ControllerConfig;
    use rc_car_controller::consumer::{ActuationConsumer, Actuator, ActuatorError};
    use rc_car_controller::convert::Calibration;
    use rc_car_controller::log_drain::LogDrain;
    use rc_car_controller::log_globals::{CONTROL_LOG, NET_LOG};
    use rc_car_controller::producer::MeasurementProducer;
    use rc_car_controller::sample::ActuationCommand;
    use rc_car_controller::schedule::Clock;
    use rc_car_controller::tasks;
    use rc_car_controller::telemetry::TelemetryFanout;
    use rc_car_controller::transmitter::{ClientLink, LinkError, TelemetryTransmitter};

    use super::{
        channels, Console, ACTUATION, ECHO_LATCH, FAULTS, LINK, PULSE_LATCH, TELEMETRY,
        THROTTLE_IN_LATCH,
    };

    const RUN_FOR: Duration = Duration::from_secs(3);

    /// Wall-clock time base.
    #[derive(Clone, Copy)]
    struct StdClock {
        start: Instant,
    }

    impl Clock for StdClock {
        fn now_us(&self) -> u64 {
            self.start.elapsed().as_micros() as u64
        }

        fn sleep_until(&self, deadline_us: u64) {
            let now = self.now_us();
            if deadline_us > now {
                thread::sleep(Duration::from_micros(deadline_us - now));
            }
        }

        fn relax(&self) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Telemetry client on stdout.
    struct StdoutLink;

    impl ClientLink for StdoutLink {
        fn send_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
            std::io::stdout().write_all(bytes).map_err(|_| LinkError::Io)
        }
    }

    /// Speed controller stand-in: logs duty changes.
    struct SimThrottle {
        duty: f32,
        clock: StdClock,
    }

    impl Actuator for SimThrottle {
        fn apply(&mut self, command: ActuationCommand) -> Result<(), ActuatorError> {
            if (command.duty() - self.duty).abs() >= 1.0 {
                rc_car_controller::rt_debug!(
                    CONTROL_LOG,
                    "throttle",
                    self.clock.now_us(),
                    "duty {:.2} -> {:.2} %",
                    self.duty,
                    command.duty()
                );
                self.duty = command.duty();
            }
            Ok(())
        }
    }

    /// Synthetic RC receiver, wheel and ultrasonic echo.
    fn simulate_sensors(config: ControllerConfig, clock: StdClock) {
        let ticks_per_us = (config.capture_clock_hz / 1_000_000).max(1);
        let mut throttle_in = EdgePairCapture::new(&THROTTLE_IN_LATCH).with_faults(&FAULTS);
        let mut echo = EdgePairCapture::new(&ECHO_LATCH).with_faults(&FAULTS);
        let mut pulses = PulseLatcher::new(&PULSE_LATCH);

        let mut step: u32 = 0;
        loop {
            let now_ticks = (clock.now_us() as u32).wrapping_mul(ticks_per_us);

            // Throttle sweeps 1.5 ms to 1.9 ms high time
            let high_us = 1_500 + (step % 40) * 10;
            throttle_in.on_edge(Edge::Rising, now_ticks);
            throttle_in.on_edge(Edge::Falling, now_ticks.wrapping_add(high_us * ticks_per_us));

            // Obstacle approaching from 2 m
            let distance_m = 2.0 - (step % 100) as f32 * 0.015;
            let flight_us = (distance_m * 2.0 / config.speed_of_sound * 1e6) as u32;
            echo.on_edge(Edge::Rising, now_ticks);
            echo.on_edge(Edge::Falling, now_ticks.wrapping_add(flight_us * ticks_per_us));

            if step % (config.tacho_latch_period_ms / 10).max(1) == 0 {
                pulses.on_interval((step % 60) as i32);
            }

            step = step.wrapping_add(1);
            thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn run() {
        println!("{}", env!("VERSION_STRING"));

        let config = ControllerConfig::DEFAULT;
        if let Err(e) = config.validate() {
            panic!("invalid configuration: {}", e);
        }
        let calibration = match Calibration::new(&config, config.capture_clock_hz) {
            Ok(calibration) => calibration,
            Err(e) => panic!("invalid calibration: {}", e),
        };

        let clock = StdClock {
            start: Instant::now(),
        };
        let period_us = config.sample_period_us();

        thread::spawn(move || simulate_sensors(config, clock));

        let producer = MeasurementProducer::new(
            &config,
            calibration,
            channels(),
            &ACTUATION,
            TelemetryFanout::new(&TELEMETRY, &LINK),
            &FAULTS,
            &CONTROL_LOG,
        );
        thread::spawn(move || tasks::run_producer(producer, period_us, &clock));

        let consumer = ActuationConsumer::new(
            &config,
            SimThrottle {
                duty: config.stationary_duty,
                clock,
            },
            &ACTUATION,
            &FAULTS,
            &CONTROL_LOG,
        );
        thread::spawn(move || tasks::run_consumer(consumer, period_us, &clock));

        thread::spawn(move || {
            let transmitter = TelemetryTransmitter::new(&TELEMETRY, &LINK, &FAULTS, &NET_LOG);
            let mut link = StdoutLink;
            transmitter.serve(&mut link, &clock)
        });

        let mut log_drain = LogDrain::default();
        let mut console = Console;
        let stop = Instant::now() + RUN_FOR;
        while Instant::now() < stop {
            log_drain.poll(clock.now_us(), &CONTROL_LOG, &NET_LOG, &FAULTS, &mut console);
            thread::sleep(Duration::from_millis(20));
        }
        log_drain.poll(u64::MAX, &CONTROL_LOG, &NET_LOG, &FAULTS, &mut console);
    }
}
