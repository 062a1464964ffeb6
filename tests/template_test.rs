use reflect_db::*;

static BUFFER: StructCell = StructCell::new();
static BUFFER_U32: StructCell = StructCell::new();
static BUFFER_F32: StructCell = StructCell::new();
static BUFFER_OPAQUE: StructCell = StructCell::new();
static PAIR: StructCell = StructCell::new();
static PAIR_U32_F32: StructCell = StructCell::new();

fn buffer() -> &'static Struct {
    BUFFER.get_or_init(|| {
        let mut archetype = Struct::new_struct("Buffer", entity_id("gen::Buffer"), 0);
        archetype.add_template_parameter("T").expect("fresh struct");
        archetype
    })
}

fn buffer_of(cell: &'static StructCell, name: &'static str, argument: Option<ArchetypeRef>) -> &'static Struct {
    cell.get_or_init(|| {
        let mut archetype = Struct::new_struct(name, entity_id(name), 24);
        archetype.set_template_arguments(buffer(), [argument]).expect("one argument");
        archetype
    })
}

fn pair() -> &'static Struct {
    PAIR.get_or_init(|| {
        let mut archetype = Struct::new_struct("Pair", entity_id("gen::Pair"), 0);
        archetype.add_template_parameter("A").expect("fresh struct");
        archetype.add_template_parameter("B").expect("still generic");
        archetype
    })
}

fn pair_u32_f32() -> &'static Struct {
    PAIR_U32_F32.get_or_init(|| {
        let mut archetype = Struct::new_struct("Pair<u32, f32>", entity_id("gen::Pair<u32, f32>"), 8);
        archetype
            .set_template_arguments(pair(), [Some(u32::reflected_archetype()), Some(f32::reflected_archetype())])
            .expect("two arguments");
        archetype
    })
}

fn register_buffers() -> [&'static Struct; 3] {
    [
        buffer_of(&BUFFER_U32, "Buffer<u32>", Some(u32::reflected_archetype())),
        buffer_of(&BUFFER_F32, "Buffer<f32>", Some(f32::reflected_archetype())),
        buffer_of(&BUFFER_OPAQUE, "Buffer<String>", None),
    ]
}

#[test]
fn generic_declares_its_parameters() {
    let pair = pair();

    assert!(pair.is_template());
    assert!(pair.instantiated_template().is_none());
    let names: Vec<_> = pair.template_parameters().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["A", "B"]);
    assert_eq!(pair.get_template_parameter("B").map(|p| p.index()), Some(1));
    assert!(pair.get_template_parameter("C").is_none());
}

#[test]
fn instantiations_are_found_by_argument_list() {
    let [of_u32, of_f32, opaque] = register_buffers();
    let buffer = buffer();

    assert_eq!(buffer.template_instantiations().len(), 3);

    let found = buffer.get_template_instantiation(&[Some(u32::reflected_archetype())]).expect("Buffer<u32>");
    assert!(std::ptr::eq(found, of_u32));
    let found = buffer.get_template_instantiation_by_types(&[Type::reflected::<f32>()]).expect("Buffer<f32>");
    assert!(std::ptr::eq(found, of_f32));
    let found = buffer.get_template_instantiation_by_types(&[Type::of::<String>()]).expect("unreflected argument");
    assert!(std::ptr::eq(found, opaque));

    assert!(buffer.get_template_instantiation(&[Some(u8::reflected_archetype())]).is_none());
    assert!(buffer.get_template_instantiation(&[]).is_none());
    assert!(of_u32.get_template_instantiation(&[Some(u32::reflected_archetype())]).is_none());
}

#[test]
fn instantiation_knows_its_generic_and_arguments() {
    let instantiation = pair_u32_f32();

    assert!(!instantiation.is_template());
    assert!(instantiation.instantiated_template().is_some_and(|generic| std::ptr::eq(generic, pair())));

    let second = instantiation.get_template_argument_at(1).expect("B bound");
    assert_eq!(second.parameter().name(), "B");
    assert_eq!(second.archetype().map(|a| a.name()), Some("f32"));
    assert!(instantiation.get_template_argument_at(2).is_none());

    let found = pair()
        .get_template_instantiation_by_types(&[Type::reflected::<u32>(), Type::reflected::<f32>()])
        .expect("registered");
    assert!(std::ptr::eq(found, instantiation));
    assert!(pair().get_template_instantiation_by_types(&[Type::reflected::<f32>(), Type::reflected::<u32>()]).is_none());
}

#[test]
fn binding_is_validated() {
    let mut wrong_arity = Struct::new_struct("Pair<u32>", entity_id("gen::Pair<u32>"), 4);
    assert_eq!(
        wrong_arity.set_template_arguments(pair(), [Some(u32::reflected_archetype())]),
        Err(TemplateError::ArityMismatch {
            template: "Pair".to_owned(),
            expected: 2,
            found: 1,
        })
    );
    assert!(wrong_arity.instantiated_template().is_none());

    let plain: &'static Struct = Box::leak(Box::new(Struct::new_struct("Plain", entity_id("gen::Plain"), 4)));
    let mut orphan = Struct::new_struct("Plain<u32>", entity_id("gen::Plain<u32>"), 4);
    assert_eq!(
        orphan.set_template_arguments(plain, [None]),
        Err(TemplateError::NotATemplate("Plain".to_owned()))
    );

    let mut generic = Struct::new_struct("Wrapper", entity_id("gen::Wrapper"), 0);
    generic.add_template_parameter("T").expect("fresh struct");
    assert_eq!(
        generic.set_template_arguments(buffer(), [None]),
        Err(TemplateError::AlreadyTemplate("Wrapper".to_owned()))
    );

    let mut bound = Struct::new_struct("Buffer<bool>", entity_id("gen::Buffer<bool>"), 24);
    bound.set_template_arguments(buffer(), [Some(bool::reflected_archetype())]).expect("one argument");
    assert_eq!(
        bound.add_template_parameter("U"),
        Err(TemplateError::AlreadyInstantiated("Buffer<bool>".to_owned()))
    );
    // never registered, so the generic does not list it
    assert!(buffer().get_template_instantiation(&[Some(bool::reflected_archetype())]).is_none());
}
