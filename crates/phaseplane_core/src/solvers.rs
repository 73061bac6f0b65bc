use crate::config::{ExplorerConfig, IntegratorName};
use crate::noise::Noise;
use crate::state::{Clamp, StateArray};
use crate::traits::{Integrator, Model};
use anyhow::Result;

fn clamp_in_place(clamp: &Option<Clamp>, state: &mut StateArray) {
    if let Some(clamp) = clamp {
        clamp.apply(state);
    }
}

/// out = base + scale * k
fn offset(out: &mut StateArray, base: &StateArray, k: &StateArray, scale: f64) {
    out.reshape_like(base);
    let (out, base, k) = (out.as_mut_slice(), base.as_slice(), k.as_slice());
    for i in 0..out.len() {
        out[i] = base[i] + scale * k[i];
    }
}

/// Forward Euler
#[derive(Debug, Clone, Default)]
pub struct EulerDeterministic {
    clamp: Option<Clamp>,
    dx: StateArray,
}

impl Integrator for EulerDeterministic {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        self.dx.reshape_like(state);
        model.dfun(state, coupling, &mut self.dx);

        let dx = self.dx.as_slice();
        for (x, d) in state.as_mut_slice().iter_mut().zip(dx) {
            *x += dt * d;
        }
        clamp_in_place(&self.clamp, state);

        *t += dt;
        Ok(())
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        self.clamp = clamp;
    }
}

/// Heun's method (explicit trapezoidal predictor-corrector)
#[derive(Debug, Clone, Default)]
pub struct HeunDeterministic {
    clamp: Option<Clamp>,
    dx0: StateArray,
    dx1: StateArray,
    inter: StateArray,
}

impl Integrator for HeunDeterministic {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        self.dx0.reshape_like(state);
        self.dx1.reshape_like(state);

        model.dfun(state, coupling, &mut self.dx0);
        offset(&mut self.inter, state, &self.dx0, dt);
        clamp_in_place(&self.clamp, &mut self.inter);
        model.dfun(&self.inter, coupling, &mut self.dx1);

        let (dx0, dx1) = (self.dx0.as_slice(), self.dx1.as_slice());
        for (i, x) in state.as_mut_slice().iter_mut().enumerate() {
            *x += 0.5 * dt * (dx0[i] + dx1[i]);
        }
        clamp_in_place(&self.clamp, state);

        *t += dt;
        Ok(())
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        self.clamp = clamp;
    }
}

/// Classic Runge-Kutta 4th Order Solver
#[derive(Debug, Clone, Default)]
pub struct RK4 {
    clamp: Option<Clamp>,
    k1: StateArray,
    k2: StateArray,
    k3: StateArray,
    k4: StateArray,
    tmp: StateArray,
}

impl Integrator for RK4 {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        for k in [&mut self.k1, &mut self.k2, &mut self.k3, &mut self.k4] {
            k.reshape_like(state);
        }

        // k1 = f(y)
        model.dfun(state, coupling, &mut self.k1);

        // k2 = f(y + dt*k1/2)
        offset(&mut self.tmp, state, &self.k1, 0.5 * dt);
        clamp_in_place(&self.clamp, &mut self.tmp);
        model.dfun(&self.tmp, coupling, &mut self.k2);

        // k3 = f(y + dt*k2/2)
        offset(&mut self.tmp, state, &self.k2, 0.5 * dt);
        clamp_in_place(&self.clamp, &mut self.tmp);
        model.dfun(&self.tmp, coupling, &mut self.k3);

        // k4 = f(y + dt*k3)
        offset(&mut self.tmp, state, &self.k3, dt);
        clamp_in_place(&self.clamp, &mut self.tmp);
        model.dfun(&self.tmp, coupling, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        let sixth = 1.0 / 6.0;
        let (k1, k2, k3, k4) = (
            self.k1.as_slice(),
            self.k2.as_slice(),
            self.k3.as_slice(),
            self.k4.as_slice(),
        );
        for (i, x) in state.as_mut_slice().iter_mut().enumerate() {
            *x += dt * sixth * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
        clamp_in_place(&self.clamp, state);

        *t += dt;
        Ok(())
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        self.clamp = clamp;
    }
}

/// Euler-Maruyama with additive noise.
#[derive(Debug, Clone)]
pub struct EulerStochastic {
    noise: Noise,
    clamp: Option<Clamp>,
    dx: StateArray,
}

impl EulerStochastic {
    pub fn new(noise: Noise) -> Self {
        Self {
            noise,
            clamp: None,
            dx: StateArray::default(),
        }
    }
}

impl Integrator for EulerStochastic {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        let noise = self.noise.increment(state)?;
        self.dx.reshape_like(state);
        model.dfun(state, coupling, &mut self.dx);

        let (dx, noise) = (self.dx.as_slice(), noise.as_slice());
        for (i, x) in state.as_mut_slice().iter_mut().enumerate() {
            *x += dt * dx[i] + noise[i];
        }
        clamp_in_place(&self.clamp, state);

        *t += dt;
        Ok(())
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        self.clamp = clamp;
    }

    fn noise_mut(&mut self) -> Option<&mut Noise> {
        Some(&mut self.noise)
    }
}

/// Stochastic Heun: the same noise increment is used by predictor and corrector.
#[derive(Debug, Clone)]
pub struct HeunStochastic {
    noise: Noise,
    clamp: Option<Clamp>,
    dx0: StateArray,
    dx1: StateArray,
    inter: StateArray,
}

impl HeunStochastic {
    pub fn new(noise: Noise) -> Self {
        Self {
            noise,
            clamp: None,
            dx0: StateArray::default(),
            dx1: StateArray::default(),
            inter: StateArray::default(),
        }
    }
}

impl Integrator for HeunStochastic {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        let noise = self.noise.increment(state)?;
        self.dx0.reshape_like(state);
        self.dx1.reshape_like(state);

        model.dfun(state, coupling, &mut self.dx0);
        offset(&mut self.inter, state, &self.dx0, dt);
        for (x, n) in self.inter.as_mut_slice().iter_mut().zip(noise.as_slice()) {
            *x += n;
        }
        clamp_in_place(&self.clamp, &mut self.inter);
        model.dfun(&self.inter, coupling, &mut self.dx1);

        let (dx0, dx1, noise) = (self.dx0.as_slice(), self.dx1.as_slice(), noise.as_slice());
        for (i, x) in state.as_mut_slice().iter_mut().enumerate() {
            *x += 0.5 * dt * (dx0[i] + dx1[i]) + noise[i];
        }
        clamp_in_place(&self.clamp, state);

        *t += dt;
        Ok(())
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        self.clamp = clamp;
    }

    fn noise_mut(&mut self) -> Option<&mut Noise> {
        Some(&mut self.noise)
    }
}

/// Runtime-selected scheme, built from configuration.
#[derive(Debug, Clone)]
pub enum IntegratorKind {
    Euler(EulerDeterministic),
    Heun(HeunDeterministic),
    Rk4(RK4),
    EulerStochastic(EulerStochastic),
    HeunStochastic(HeunStochastic),
}

impl IntegratorKind {
    pub fn from_config(config: &ExplorerConfig) -> Self {
        let noise = || Noise::additive(config.noise.clone());
        match config.integrator {
            IntegratorName::Euler => IntegratorKind::Euler(EulerDeterministic::default()),
            IntegratorName::Heun => IntegratorKind::Heun(HeunDeterministic::default()),
            IntegratorName::Rk4 => IntegratorKind::Rk4(RK4::default()),
            IntegratorName::EulerStochastic => {
                IntegratorKind::EulerStochastic(EulerStochastic::new(noise()))
            }
            IntegratorName::HeunStochastic => {
                IntegratorKind::HeunStochastic(HeunStochastic::new(noise()))
            }
        }
    }
}

impl Integrator for IntegratorKind {
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()> {
        match self {
            IntegratorKind::Euler(s) => s.step(model, state, coupling, t, dt),
            IntegratorKind::Heun(s) => s.step(model, state, coupling, t, dt),
            IntegratorKind::Rk4(s) => s.step(model, state, coupling, t, dt),
            IntegratorKind::EulerStochastic(s) => s.step(model, state, coupling, t, dt),
            IntegratorKind::HeunStochastic(s) => s.step(model, state, coupling, t, dt),
        }
    }

    fn set_clamp(&mut self, clamp: Option<Clamp>) {
        match self {
            IntegratorKind::Euler(s) => s.set_clamp(clamp),
            IntegratorKind::Heun(s) => s.set_clamp(clamp),
            IntegratorKind::Rk4(s) => s.set_clamp(clamp),
            IntegratorKind::EulerStochastic(s) => s.set_clamp(clamp),
            IntegratorKind::HeunStochastic(s) => s.set_clamp(clamp),
        }
    }

    fn noise_mut(&mut self) -> Option<&mut Noise> {
        match self {
            IntegratorKind::EulerStochastic(s) => s.noise_mut(),
            IntegratorKind::HeunStochastic(s) => s.noise_mut(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EulerDeterministic, HeunDeterministic, HeunStochastic, IntegratorKind, RK4};
    use crate::config::{ExplorerConfig, IntegratorName};
    use crate::noise::{single_node_shape, Noise, NoiseConfig};
    use crate::state::{Clamp, StateArray};
    use crate::traits::{Integrator, Model};

    /// dx/dt = -x for every variable.
    struct Decay {
        names: Vec<String>,
    }

    impl Decay {
        fn new(nvar: usize) -> Self {
            Self {
                names: (0..nvar).map(|i| format!("x{i}")).collect(),
            }
        }
    }

    impl Model for Decay {
        fn name(&self) -> &str {
            "Decay"
        }
        fn state_variables(&self) -> &[String] {
            &self.names
        }
        fn state_variable_range(&self, _index: usize) -> (f64, f64) {
            (-1.0, 1.0)
        }
        fn number_of_modes(&self) -> usize {
            1
        }
        fn coupling_variables(&self) -> &[usize] {
            &[]
        }
        fn dfun(&self, state: &StateArray, _coupling: &StateArray, out: &mut StateArray) {
            for (o, x) in out.as_mut_slice().iter_mut().zip(state.as_slice()) {
                *o = -x;
            }
        }
    }

    fn integrate(integrator: &mut impl Integrator, steps: usize, dt: f64) -> (StateArray, f64) {
        let model = Decay::new(1);
        let coupling = model.zero_coupling();
        let mut state = StateArray::broadcast(&[1.0], 1);
        let mut t = 0.0;
        for _ in 0..steps {
            integrator
                .step(&model, &mut state, &coupling, &mut t, dt)
                .expect("deterministic step");
        }
        (state, t)
    }

    #[test]
    fn deterministic_schemes_track_exponential_decay() {
        let exact = (-1.0f64).exp();
        let (euler, t) = integrate(&mut EulerDeterministic::default(), 100, 0.01);
        let (heun, _) = integrate(&mut HeunDeterministic::default(), 100, 0.01);
        let (rk4, _) = integrate(&mut RK4::default(), 100, 0.01);

        assert!((t - 1.0).abs() < 1e-12);
        assert!((euler.get(0, 0) - exact).abs() < 5e-3);
        assert!((heun.get(0, 0) - exact).abs() < 5e-5);
        assert!((rk4.get(0, 0) - exact).abs() < 1e-9);
    }

    #[test]
    fn clamped_variables_do_not_move() {
        let model = Decay::new(3);
        let coupling = model.zero_coupling();
        let mut state = StateArray::broadcast(&[1.0, 0.5, -0.25], 1);
        let clamp = Clamp::from_state(&state, &[1]).expect("valid index");
        let mut integrator = RK4::default();
        integrator.set_clamp(Some(clamp));

        let mut t = 0.0;
        for _ in 0..10 {
            integrator
                .step(&model, &mut state, &coupling, &mut t, 0.1)
                .expect("deterministic step");
        }
        assert_eq!(state.get(1, 0), 0.5);
        assert!(state.get(0, 0) < 1.0);
        assert!(state.get(2, 0) > -0.25);
    }

    #[test]
    fn stochastic_step_requires_configured_noise() {
        let model = Decay::new(2);
        let coupling = model.zero_coupling();
        let mut state = StateArray::broadcast(&[0.0, 0.0], 1);
        let mut integrator = HeunStochastic::new(Noise::additive(NoiseConfig::default()));
        let mut t = 0.0;
        assert!(integrator
            .step(&model, &mut state, &coupling, &mut t, 0.1)
            .is_err());

        integrator
            .noise_mut()
            .expect("stochastic scheme")
            .configure_white(0.1, single_node_shape(2, 1));
        integrator
            .step(&model, &mut state, &coupling, &mut t, 0.1)
            .expect("configured noise");
        assert!(state.as_slice().iter().any(|x| *x != 0.0));
    }

    #[test]
    fn kind_follows_configuration() {
        let mut config = ExplorerConfig::default();
        config.integrator = IntegratorName::EulerStochastic;
        let mut kind = IntegratorKind::from_config(&config);
        assert!(kind.noise_mut().is_some());

        config.integrator = IntegratorName::Rk4;
        let mut kind = IntegratorKind::from_config(&config);
        assert!(kind.noise_mut().is_none());
    }
}
